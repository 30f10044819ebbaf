//! Literature search, variant-mention mining and the persistent cache

pub mod cache;
pub mod mining;
pub mod source;
pub mod store;
pub mod types;

pub use cache::{EvictionPolicy, LiteratureCache, LiteratureCacheStats, LiteratureLookup};
pub use source::LiteratureSource;
pub use store::{ClearScope, JsonFileStore, LiteratureStore, MemoryStore, StoredLiterature};
pub use types::{
    LiteratureEntry, LiteratureKey, LiteratureStatus, MentionContext, NotationKind,
    RawPublication, SearchParams, DEFAULT_SEARCH_DEPTH,
};
