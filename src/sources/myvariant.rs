//! MyVariant.info annotation sources
//!
//! One endpoint aggregates gnomAD, ClinVar, CADD and dbNSFP. Each evidence
//! kind is registered as its own [`AnnotationSource`] so a slow or failing
//! field group degrades independently of the others.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::http_client::HttpClient;
use crate::annotation::{AnnotationSource, ClinicalSignificance, PartialAnnotation, SourceKind};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::gene::GeneContext;
use crate::variant::GenomicVariant;

pub struct MyVariantSource {
    client: Arc<HttpClient>,
    config: SourceConfig,
    kind: SourceKind,
}

impl MyVariantSource {
    pub fn new(client: Arc<HttpClient>, config: SourceConfig, kind: SourceKind) -> Self {
        Self {
            client,
            config,
            kind,
        }
    }

    /// One source per evidence kind served by MyVariant.info
    pub fn all(client: Arc<HttpClient>, config: &SourceConfig) -> Vec<Self> {
        [
            SourceKind::PopulationFrequency,
            SourceKind::ClinicalSignificance,
            SourceKind::InSilico,
            SourceKind::Conservation,
        ]
        .into_iter()
        .map(|kind| Self::new(client.clone(), config.clone(), kind))
        .collect()
    }

    fn fields(&self) -> &'static str {
        match self.kind {
            SourceKind::PopulationFrequency => "gnomad_genome.af,gnomad_exome.af",
            SourceKind::ClinicalSignificance => "clinvar.variant_id,clinvar.rcv.clinical_significance",
            SourceKind::InSilico => "cadd.phred,dbnsfp.sift.score,dbnsfp.polyphen2.hdiv.score",
            SourceKind::Conservation => "dbnsfp.phylop.100way_vertebrate.score,dbnsfp.gerp++.rs",
            SourceKind::Functional => "",
        }
    }
}

/// First number in a value that may be a scalar, an array or a nested object
fn first_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.iter().find_map(first_number),
        Value::Object(map) => map.values().find_map(first_number),
        _ => None,
    }
}

fn number_at(doc: &Value, pointers: &[&str]) -> Option<f64> {
    pointers
        .iter()
        .find_map(|p| doc.pointer(p).and_then(first_number))
}

/// Most severe explicit call across RCV records; otherwise the first one seen
fn clinical_significance(doc: &Value) -> Option<ClinicalSignificance> {
    let rcv = doc.pointer("/clinvar/rcv")?;
    let records: Vec<&Value> = match rcv {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let calls: Vec<ClinicalSignificance> = records
        .iter()
        .filter_map(|r| r.get("clinical_significance")?.as_str())
        .filter_map(|s| s.parse().ok())
        .collect();
    let rank = |s: &ClinicalSignificance| match s {
        ClinicalSignificance::Pathogenic => 0,
        ClinicalSignificance::LikelyPathogenic => 1,
        ClinicalSignificance::Conflicting => 2,
        ClinicalSignificance::UncertainSignificance => 3,
        ClinicalSignificance::LikelyBenign => 4,
        ClinicalSignificance::Benign => 5,
        ClinicalSignificance::Other => 6,
    };
    calls.into_iter().min_by_key(rank)
}

fn clinvar_id(doc: &Value) -> Option<String> {
    match doc.pointer("/clinvar/variant_id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Extract the fields a source of `kind` contributes from a MyVariant document
fn extract(kind: SourceKind, doc: &Value) -> PartialAnnotation {
    match kind {
        SourceKind::PopulationFrequency => PartialAnnotation {
            gnomad_af: number_at(doc, &["/gnomad_genome/af/af", "/gnomad_exome/af/af"]),
            gnomad_af_popmax: number_at(
                doc,
                &["/gnomad_genome/af/af_popmax", "/gnomad_exome/af/af_popmax"],
            ),
            ..Default::default()
        },
        SourceKind::ClinicalSignificance => PartialAnnotation {
            clinvar_significance: clinical_significance(doc),
            clinvar_id: clinvar_id(doc),
            ..Default::default()
        },
        SourceKind::InSilico => PartialAnnotation {
            cadd_phred: number_at(doc, &["/cadd/phred"]),
            sift: number_at(doc, &["/dbnsfp/sift/score"]),
            polyphen: number_at(doc, &["/dbnsfp/polyphen2/hdiv/score"]),
            ..Default::default()
        },
        SourceKind::Conservation => PartialAnnotation {
            phylop: number_at(doc, &["/dbnsfp/phylop/100way_vertebrate/score"]),
            gerp: number_at(doc, &["/dbnsfp/gerp++/rs"]),
            ..Default::default()
        },
        SourceKind::Functional => PartialAnnotation::default(),
    }
}

#[async_trait]
impl AnnotationSource for MyVariantSource {
    fn name(&self) -> &str {
        match self.kind {
            SourceKind::PopulationFrequency => "gnomad",
            SourceKind::ClinicalSignificance => "clinvar",
            SourceKind::InSilico => "dbnsfp",
            SourceKind::Conservation => "conservation",
            SourceKind::Functional => "myvariant",
        }
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn fetch(
        &self,
        variant: &GenomicVariant,
        _gene: &GeneContext,
    ) -> Result<PartialAnnotation, SourceError> {
        let id: String =
            url::form_urlencoded::byte_serialize(format!("chr{}", variant.hgvs_g()).as_bytes()).collect();
        let url = format!(
            "{}/v1/variant/{}?fields={}",
            self.config.base_url.trim_end_matches('/'),
            id,
            self.fields()
        );
        // An unknown variant is an empty answer, not a failure
        let doc: Option<Value> = self.client.get_json(&url, self.config.timeout()).await?;
        Ok(doc.map(|d| extract(self.kind, &d)).unwrap_or_default())
    }
}
