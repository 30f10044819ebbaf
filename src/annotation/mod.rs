//! Variant annotation: sources, merge rules and pathogenicity calls

pub mod aggregator;
pub mod classify;
pub mod record;
pub mod significance;
pub mod source;

pub use aggregator::AnnotationAggregator;
pub use classify::classify;
pub use record::{AnnotationRecord, GoTerm, PartialAnnotation, SourceOutcome, SourceStatus};
pub use significance::{ClinicalSignificance, Pathogenicity};
pub use source::{AnnotationSource, SourceKind, DEFAULT_SOURCE_TIMEOUT};
