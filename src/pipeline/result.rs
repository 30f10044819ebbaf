//! Analysis requests and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gene::GeneContext;
use crate::literature::{LiteratureEntry, LiteratureStatus};
use crate::mapper::MappedVariant;
use crate::variant::GenomicVariant;

/// Default number of variants per mapping chunk
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Feature flags for one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub include_literature: bool,
    pub include_structure: bool,
    pub include_conservation: bool,
    /// Variants per mapping chunk; progress is reported per chunk
    pub batch_size: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_literature: true,
            include_structure: true,
            include_conservation: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub gene: String,
    pub variants: Vec<GenomicVariant>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(gene: impl Into<String>, variants: Vec<GenomicVariant>) -> Self {
        Self {
            gene: gene.into(),
            variants,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }
}

/// Everything one analysis produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub gene: GeneContext,
    /// One entry per input variant, in input order
    pub variants: Vec<MappedVariant>,
    pub literature: Vec<LiteratureEntry>,
    pub literature_status: LiteratureStatus,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Variants that reached a structure coordinate
    pub fn mapped_count(&self) -> usize {
        self.variants.iter().filter(|v| v.is_mapped()).count()
    }

    pub fn variant(&self, index: usize) -> Option<&MappedVariant> {
        self.variants.get(index)
    }
}
