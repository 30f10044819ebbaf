//! Annotation source abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::record::PartialAnnotation;
use crate::error::SourceError;
use crate::gene::GeneContext;
use crate::variant::GenomicVariant;

/// Default per-call timeout for annotation sources
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// The kind of evidence a source provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PopulationFrequency,
    ClinicalSignificance,
    InSilico,
    Conservation,
    Functional,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PopulationFrequency => "population_frequency",
            SourceKind::ClinicalSignificance => "clinical_significance",
            SourceKind::InSilico => "in_silico",
            SourceKind::Conservation => "conservation",
            SourceKind::Functional => "functional",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One upstream annotation provider
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    /// Stable source name, used in outcomes and logs
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Per-call timeout; the request deadline still caps it
    fn timeout(&self) -> Duration {
        DEFAULT_SOURCE_TIMEOUT
    }

    async fn fetch(
        &self,
        variant: &GenomicVariant,
        gene: &GeneContext,
    ) -> Result<PartialAnnotation, SourceError>;
}
