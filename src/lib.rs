// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! varviz: variant annotation and coordinate mapping
//!
//! Resolves a gene to its canonical transcript, UniProt accession and 3D
//! structure, maps genomic variants onto protein residues and structure
//! coordinates, merges annotations from independent sources and mines the
//! literature for variant mentions.
//!
//! # Example
//!
//! ```
//! use varviz::{AnalysisRequest, GenomicVariant, Pipeline};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! // In-memory fixtures; use `PipelineBuilder::from_config` for the public APIs
//! let pipeline = Pipeline::mock();
//!
//! let request = AnalysisRequest::new(
//!     "TP53",
//!     vec![GenomicVariant::new("17", 7577120, "C", "T")],
//! );
//! let result = pipeline.analyze(request).await.unwrap();
//!
//! let variant = &result.variants[0];
//! assert_eq!(variant.protein_change.as_ref().unwrap().hgvs_p(), "p.Arg273His");
//! assert!(variant.coordinate.is_some());
//! # });
//! ```

pub mod annotation;
pub mod cache;
pub mod config;
pub mod error;
pub mod gene;
pub mod literature;
pub mod mapper;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod pipeline;
pub mod reference;
pub mod sources;
pub mod structure;
pub mod variant;

// Re-export commonly used types
pub use annotation::{AnnotationRecord, ClinicalSignificance, Pathogenicity, SourceStatus};
pub use config::PipelineConfig;
pub use error::{ErrorCode, SourceError, VariantValidationError, VarvizError};
pub use gene::{GeneContext, GeneResolver};
pub use literature::{ClearScope, LiteratureEntry, LiteratureStatus};
pub use mapper::{CoordinateMapper, MappedVariant, MappingOptions, UnmappedReason};
pub use pipeline::{
    AnalysisOptions, AnalysisRequest, AnalysisResult, Pipeline, PipelineBuilder, ProgressEvent,
    Stage,
};
pub use sources::SourceSet;
pub use variant::GenomicVariant;

/// Result type alias for varviz operations
pub type Result<T> = std::result::Result<T, VarvizError>;
