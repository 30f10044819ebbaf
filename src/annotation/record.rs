//! Annotation records
//!
//! Every field is independently nullable. `None` means no source answered for
//! that field; it never stands for zero.

use serde::{Deserialize, Serialize};

use super::significance::{ClinicalSignificance, Pathogenicity};
use super::source::SourceKind;

/// A Gene Ontology term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoTerm {
    /// e.g. "GO:0003700"
    pub id: String,
    pub name: String,
    /// "F", "P" or "C"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
}

/// Fields one source contributed for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAnnotation {
    pub gnomad_af: Option<f64>,
    pub gnomad_af_popmax: Option<f64>,
    pub clinvar_significance: Option<ClinicalSignificance>,
    pub clinvar_id: Option<String>,
    pub cadd_phred: Option<f64>,
    pub sift: Option<f64>,
    pub polyphen: Option<f64>,
    pub phylop: Option<f64>,
    pub gerp: Option<f64>,
    pub go_terms: Option<Vec<GoTerm>>,
}

impl PartialAnnotation {
    /// Fill every field still empty in `self` from `other`
    pub fn merge_missing(&mut self, other: PartialAnnotation) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.gnomad_af, other.gnomad_af);
        fill(&mut self.gnomad_af_popmax, other.gnomad_af_popmax);
        fill(&mut self.clinvar_significance, other.clinvar_significance);
        fill(&mut self.clinvar_id, other.clinvar_id);
        fill(&mut self.cadd_phred, other.cadd_phred);
        fill(&mut self.sift, other.sift);
        fill(&mut self.polyphen, other.polyphen);
        fill(&mut self.phylop, other.phylop);
        fill(&mut self.gerp, other.gerp);
        fill(&mut self.go_terms, other.go_terms);
    }
}

/// What happened when a source was asked about a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Timeout,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub kind: SourceKind,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merged annotation for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(flatten)]
    pub fields: PartialAnnotation,
    /// Derived call; `None` when every source failed or the variant was not annotated
    pub pathogenicity: Option<Pathogenicity>,
    pub all_sources_failed: bool,
    /// One outcome per registered source, in registration order
    pub sources: Vec<SourceOutcome>,
}

impl AnnotationRecord {
    /// Record for a variant that was never sent to any source
    pub fn not_attempted(sources: Vec<SourceOutcome>) -> Self {
        Self {
            fields: PartialAnnotation::default(),
            pathogenicity: None,
            all_sources_failed: false,
            sources,
        }
    }

    pub fn outcome(&self, source: &str) -> Option<&SourceOutcome> {
        self.sources.iter().find(|o| o.source == source)
    }
}
