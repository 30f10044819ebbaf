//! Concurrent fan-out to annotation sources and deterministic merge

use std::sync::Arc;
use std::time::Instant as StdInstant;

use futures_util::future::join_all;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::classify::classify;
use super::record::{AnnotationRecord, PartialAnnotation, SourceOutcome, SourceStatus};
use super::source::{AnnotationSource, SourceKind};
use crate::error::SourceError;
use crate::gene::GeneContext;
use crate::variant::GenomicVariant;

/// Queries every registered source for a variant and merges the answers
///
/// Fields are merged in registration order: the first source to supply a
/// field wins. A failing source only leaves its own fields empty.
pub struct AnnotationAggregator {
    sources: Vec<Arc<dyn AnnotationSource>>,
}

impl AnnotationAggregator {
    pub fn new(sources: Vec<Arc<dyn AnnotationSource>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Record for a variant that is not sent upstream (e.g. failed validation)
    pub fn skipped_record(&self, reason: &str) -> AnnotationRecord {
        AnnotationRecord::not_attempted(
            self.sources
                .iter()
                .map(|s| SourceOutcome {
                    source: s.name().to_string(),
                    kind: s.kind(),
                    status: SourceStatus::Skipped,
                    error: Some(reason.to_string()),
                })
                .collect(),
        )
    }

    /// Annotate one variant; never fails, degraded sources show up in `sources`
    pub async fn annotate(
        &self,
        variant: &GenomicVariant,
        gene: &GeneContext,
        include_conservation: bool,
        deadline: Instant,
    ) -> AnnotationRecord {
        let calls = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                if source.kind() == SourceKind::Conservation && !include_conservation {
                    return (source, None);
                }
                let budget = source.timeout();
                let own_deadline = Instant::now() + budget;
                let started = StdInstant::now();
                // The request deadline may cut a call short of its own budget;
                // either way it reports as a timeout.
                let result = timeout_at(own_deadline.min(deadline), source.fetch(variant, gene))
                    .await
                    .unwrap_or(Err(SourceError::Timeout(budget)));
                debug!(
                    source = source.name(),
                    variant = %variant,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "annotation source finished"
                );
                (source, Some(result))
            }
        });

        let results = join_all(calls).await;

        let mut fields = PartialAnnotation::default();
        let mut outcomes = Vec::with_capacity(results.len());
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for (source, result) in results {
            let (status, error) = match result {
                None => (SourceStatus::Skipped, None),
                Some(Ok(partial)) => {
                    attempted += 1;
                    fields.merge_missing(partial);
                    (SourceStatus::Ok, None)
                }
                Some(Err(e)) => {
                    attempted += 1;
                    failed += 1;
                    warn!(source = source.name(), variant = %variant, error = %e, "annotation source failed");
                    let status = if e.is_timeout() {
                        SourceStatus::Timeout
                    } else {
                        SourceStatus::Error
                    };
                    (status, Some(e.to_string()))
                }
            };
            outcomes.push(SourceOutcome {
                source: source.name().to_string(),
                kind: source.kind(),
                status,
                error,
            });
        }

        let all_sources_failed = attempted > 0 && failed == attempted;
        if all_sources_failed {
            warn!(variant = %variant, "all annotation sources failed");
            return AnnotationRecord {
                fields: PartialAnnotation::default(),
                pathogenicity: None,
                all_sources_failed,
                sources: outcomes,
            };
        }

        let pathogenicity = Some(classify(&fields));
        AnnotationRecord {
            fields,
            pathogenicity,
            all_sources_failed,
            sources: outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::significance::{ClinicalSignificance, Pathogenicity};
    use crate::sources::mock::{tp53_context, MockAnnotationSource};
    use std::time::Duration;

    fn variant() -> GenomicVariant {
        GenomicVariant::new("17", 7577120, "C", "T")
    }

    fn source(name: &str, kind: SourceKind, fields: PartialAnnotation) -> Arc<MockAnnotationSource> {
        Arc::new(MockAnnotationSource::new(name, kind, fields))
    }

    fn dyn_sources(sources: &[Arc<MockAnnotationSource>]) -> Vec<Arc<dyn AnnotationSource>> {
        sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn AnnotationSource>)
            .collect()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_merge_in_registration_order() {
        let first = source(
            "first",
            SourceKind::InSilico,
            PartialAnnotation {
                cadd_phred: Some(35.0),
                ..Default::default()
            },
        );
        let second = source(
            "second",
            SourceKind::PopulationFrequency,
            PartialAnnotation {
                cadd_phred: Some(1.0),
                gnomad_af: Some(0.0001),
                ..Default::default()
            },
        );
        let aggregator = AnnotationAggregator::new(dyn_sources(&[first, second]));
        let record = aggregator
            .annotate(&variant(), &tp53_context(), true, far_deadline())
            .await;

        assert_eq!(record.fields.cadd_phred, Some(35.0));
        assert_eq!(record.fields.gnomad_af, Some(0.0001));
        assert_eq!(record.pathogenicity, Some(Pathogenicity::LikelyPathogenic));
        assert!(!record.all_sources_failed);
        assert_eq!(aggregator.source_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_fields() {
        let sources: Vec<Arc<MockAnnotationSource>> = vec![
            source(
                "gnomad",
                SourceKind::PopulationFrequency,
                PartialAnnotation {
                    gnomad_af: Some(0.00002),
                    ..Default::default()
                },
            ),
            source(
                "clinvar",
                SourceKind::ClinicalSignificance,
                PartialAnnotation {
                    clinvar_significance: Some(ClinicalSignificance::Pathogenic),
                    ..Default::default()
                },
            ),
            source("cadd", SourceKind::InSilico, PartialAnnotation::default()),
            source("phylop", SourceKind::Conservation, PartialAnnotation::default()),
            source("go", SourceKind::Functional, PartialAnnotation::default()),
        ];
        sources[2].fail_with(SourceError::Http {
            status: 503,
            url: "https://example.invalid".to_string(),
        });
        sources[3].set_delay(Duration::from_secs(5));
        sources[3].set_timeout(Duration::from_millis(50));

        let aggregator = AnnotationAggregator::new(dyn_sources(&sources));
        let record = aggregator
            .annotate(&variant(), &tp53_context(), true, far_deadline())
            .await;

        assert_eq!(record.fields.gnomad_af, Some(0.00002));
        assert_eq!(record.pathogenicity, Some(Pathogenicity::Pathogenic));
        assert!(!record.all_sources_failed);
        assert_eq!(record.outcome("cadd").unwrap().status, SourceStatus::Error);
        assert_eq!(record.outcome("phylop").unwrap().status, SourceStatus::Timeout);
        assert_eq!(record.outcome("go").unwrap().status, SourceStatus::Ok);
        assert!(record.fields.phylop.is_none());
    }

    #[tokio::test]
    async fn test_all_sources_failed() {
        let a = source("a", SourceKind::InSilico, PartialAnnotation::default());
        let b = source("b", SourceKind::ClinicalSignificance, PartialAnnotation::default());
        a.fail_with(SourceError::Unavailable("down".to_string()));
        b.fail_with(SourceError::Decode("bad json".to_string()));

        let aggregator = AnnotationAggregator::new(dyn_sources(&[a, b]));
        let record = aggregator
            .annotate(&variant(), &tp53_context(), true, far_deadline())
            .await;

        assert!(record.all_sources_failed);
        assert!(record.pathogenicity.is_none());
        assert_eq!(record.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_conservation_skipped_when_excluded() {
        let cons = source(
            "phylop",
            SourceKind::Conservation,
            PartialAnnotation {
                phylop: Some(7.5),
                ..Default::default()
            },
        );
        let aggregator = AnnotationAggregator::new(dyn_sources(&[cons.clone()]));
        let record = aggregator
            .annotate(&variant(), &tp53_context(), false, far_deadline())
            .await;

        assert_eq!(cons.calls(), 0);
        assert_eq!(record.outcome("phylop").unwrap().status, SourceStatus::Skipped);
        assert!(record.fields.phylop.is_none());
        // Nothing attempted is not the same as everything failing
        assert!(!record.all_sources_failed);
        assert_eq!(record.pathogenicity, Some(Pathogenicity::UncertainSignificance));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_deadline_caps_source_timeout() {
        let slow = source("slow", SourceKind::InSilico, PartialAnnotation::default());
        slow.set_delay(Duration::from_secs(30));
        let aggregator = AnnotationAggregator::new(dyn_sources(&[slow]));

        let deadline = Instant::now() + Duration::from_millis(100);
        let record = aggregator
            .annotate(&variant(), &tp53_context(), true, deadline)
            .await;

        assert_eq!(record.outcome("slow").unwrap().status, SourceStatus::Timeout);
        assert!(record.all_sources_failed);
    }

    #[test]
    fn test_skipped_record() {
        let a = source("a", SourceKind::InSilico, PartialAnnotation::default());
        let aggregator = AnnotationAggregator::new(dyn_sources(&[a]));
        let record = aggregator.skipped_record("invalid variant");
        assert_eq!(record.sources[0].status, SourceStatus::Skipped);
        assert!(record.pathogenicity.is_none());
        assert!(!record.all_sources_failed);
    }
}
