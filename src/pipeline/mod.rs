//! Pipeline orchestration
//!
//! `Resolving → Mapping → Annotating → MiningLiterature → Assembling → Complete`.
//! Only a failure while resolving the gene aborts a request; every later
//! stage degrades per variant or per source.

pub mod events;
pub mod orchestrator;
pub mod result;

pub use events::{ProgressEvent, ProgressSubscription, Stage};
pub use orchestrator::{ClearReport, Pipeline, PipelineBuilder, PipelineCacheStats};
pub use result::{AnalysisOptions, AnalysisRequest, AnalysisResult, DEFAULT_BATCH_SIZE};
