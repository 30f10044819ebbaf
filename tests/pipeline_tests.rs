//! End-to-end pipeline tests against the in-memory fixtures
//!
//! TP53 sits on the minus strand: genomic 17:7577120 C>T is c.818G>A,
//! codon 273 CGT>CAT, p.Arg273His.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use varviz::annotation::{AnnotationSource, SourceStatus};
use varviz::config::PipelineSettings;
use varviz::error::SourceError;
use varviz::gene::StructureSource;
use varviz::literature::LiteratureStatus;
use varviz::sources::mock::{
    standard_annotation_sources, MockGeneLookup, MockLiteratureSource, MockStructureSource,
};
use varviz::{
    AnalysisOptions, AnalysisRequest, ErrorCode, GenomicVariant, Pipeline, ProgressEvent,
    SourceSet, Stage, UnmappedReason, VarvizError,
};

fn r273h() -> GenomicVariant {
    GenomicVariant::new("17", 7577120, "C", "T")
}

fn tp53(variants: Vec<GenomicVariant>) -> AnalysisRequest {
    AnalysisRequest::new("TP53", variants)
}

fn mock_sources_with(structures: Vec<Arc<dyn StructureSource>>) -> SourceSet {
    SourceSet {
        structures,
        ..SourceSet::mock()
    }
}

// =============================================================================
// Mapping outcomes
// =============================================================================

#[tokio::test]
async fn test_r273h_maps_to_structure() {
    let result = Pipeline::mock().analyze(tp53(vec![r273h()])).await.unwrap();

    assert_eq!(result.gene.symbol, "TP53");
    assert_eq!(result.gene.transcript.id, "ENST00000269305.9");
    assert_eq!(result.gene.uniprot, "P04637");

    let v = &result.variants[0];
    assert_eq!(v.unmapped, None);
    assert_eq!(v.hgvs_c.as_deref(), Some("ENST00000269305.9:c.818G>A"));
    assert_eq!(v.protein_change.as_ref().unwrap().hgvs_p(), "p.Arg273His");
    assert_eq!(v.residue, Some(273));
    assert!(v.coordinate.is_some());
    assert!(!v.nearby_residues.is_empty());
    assert_eq!(result.mapped_count(), 1);
}

#[tokio::test]
async fn test_reference_mismatch_is_reported_per_variant() {
    // Plus-strand reading of the minus-strand base
    let wrong = GenomicVariant::new("17", 7577120, "G", "A");
    let result = Pipeline::mock()
        .analyze(tp53(vec![wrong, r273h()]))
        .await
        .unwrap();

    assert_eq!(
        result.variants[0].unmapped,
        Some(UnmappedReason::ReferenceMismatch)
    );
    assert!(result.variants[0].coordinate.is_none());
    assert!(result.variants[1].is_mapped());
}

#[rstest]
#[case::empty_ref(GenomicVariant::new("17", 7577120, "", "T"))]
#[case::non_positive(GenomicVariant::new("17", 0, "C", "T"))]
#[case::bad_base(GenomicVariant::new("17", 7577120, "C", "Z"))]
#[tokio::test]
async fn test_invalid_variant_is_not_annotated(#[case] variant: GenomicVariant) {
    let result = Pipeline::mock().analyze(tp53(vec![variant])).await.unwrap();
    let v = &result.variants[0];
    assert_eq!(v.unmapped, Some(UnmappedReason::InvalidVariant));
    assert!(v.validation_error.is_some());
    let annotation = v.annotation.as_ref().unwrap();
    assert!(annotation
        .sources
        .iter()
        .all(|o| o.status == SourceStatus::Skipped));
    assert_eq!(annotation.pathogenicity, None);
}

#[tokio::test]
async fn test_residue_outside_experimental_structure() {
    let pipeline = Pipeline::builder(mock_sources_with(vec![Arc::new(
        MockStructureSource::pdb_test_data(),
    )]))
    .build();

    // c.8G>T (codon 3, CGT>CTT) lies before the first resolved residue (94)
    let codon3 = GenomicVariant::new("17", 7578482, "C", "A");
    let result = pipeline
        .analyze(tp53(vec![codon3, r273h()]))
        .await
        .unwrap();

    let outside = &result.variants[0];
    assert_eq!(outside.residue, Some(3));
    assert_eq!(outside.unmapped, Some(UnmappedReason::ResidueOutOfRange));
    assert!(outside.coordinate.is_none());

    let inside = &result.variants[1];
    assert!(inside.is_mapped());
    assert_eq!(result.gene.structure_ref().unwrap().identifier, "2OCJ");
}

#[tokio::test]
async fn test_pdb_author_numbering_is_translated() {
    let pipeline = Pipeline::builder(mock_sources_with(vec![Arc::new(
        MockStructureSource::renumbered_pdb_test_data(),
    )]))
    .build();
    let reference = Pipeline::builder(mock_sources_with(vec![Arc::new(
        MockStructureSource::pdb_test_data(),
    )]))
    .build();

    let codon3 = GenomicVariant::new("17", 7578482, "C", "A");
    let result = pipeline
        .analyze(tp53(vec![r273h(), codon3]))
        .await
        .unwrap();
    let expected = reference.analyze(tp53(vec![r273h()])).await.unwrap();

    // Author residue 180 of the entry is UniProt 273
    let v = &result.variants[0];
    assert!(v.is_mapped(), "{:?}", v.note);
    assert_eq!(v.residue, Some(273));
    assert_eq!(v.structure_residue, Some(180));
    assert_eq!(v.coordinate, expected.variants[0].coordinate);
    assert_eq!(v.nearby_residues, expected.variants[0].nearby_residues);
    assert!(v.nearby_residues.iter().all(|r| (94..=312).contains(&r.number)));

    let outside = &result.variants[1];
    assert_eq!(outside.residue, Some(3));
    assert_eq!(outside.unmapped, Some(UnmappedReason::ResidueOutOfRange));
    assert!(outside.coordinate.is_none());
}

#[tokio::test]
async fn test_structure_recovers_after_source_failure() {
    let af = Arc::new(MockStructureSource::alphafold_test_data());
    af.fail_with(SourceError::Unavailable("alphafold down".to_string()));
    let pipeline = Pipeline::builder(mock_sources_with(vec![af.clone()])).build();

    let first = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    assert!(first.gene.structure.is_none());
    assert_eq!(first.variants[0].unmapped, Some(UnmappedReason::NoStructure));

    af.recover();
    let second = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    assert!(second.gene.structure.is_some());
    assert!(second.variants[0].is_mapped());
    assert_eq!(af.calls(), 2);
}

#[tokio::test]
async fn test_no_structure_available() {
    let pipeline = Pipeline::builder(mock_sources_with(Vec::new())).build();
    let result = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    let v = &result.variants[0];
    assert_eq!(v.residue, Some(273));
    assert_eq!(v.unmapped, Some(UnmappedReason::NoStructure));
}

#[tokio::test]
async fn test_structure_not_requested() {
    let options = AnalysisOptions {
        include_structure: false,
        ..Default::default()
    };
    let result = Pipeline::mock()
        .analyze(tp53(vec![r273h()]).with_options(options))
        .await
        .unwrap();
    assert!(result.gene.structure.is_none());
    assert_eq!(
        result.variants[0].unmapped,
        Some(UnmappedReason::StructureNotRequested)
    );
    assert!(result.variants[0].protein_change.is_some());
}

#[rstest]
#[case::batch_of_one(1)]
#[case::batch_of_three(3)]
#[case::single_batch(100)]
#[tokio::test]
async fn test_input_order_is_preserved(#[case] batch_size: usize) {
    let variants: Vec<GenomicVariant> = (0..7)
        .map(|i| {
            if i % 2 == 0 {
                r273h()
            } else {
                GenomicVariant::new("17", 7577120 + i, "N", "T")
            }
        })
        .collect();
    let options = AnalysisOptions {
        batch_size,
        ..Default::default()
    };
    let result = Pipeline::mock()
        .analyze(tp53(variants.clone()).with_options(options))
        .await
        .unwrap();

    assert_eq!(result.variants.len(), variants.len());
    for (i, (out, input)) in result.variants.iter().zip(&variants).enumerate() {
        assert_eq!(out.index, i);
        assert_eq!(&out.variant, input);
    }
}

#[tokio::test]
async fn test_repeated_analysis_is_identical() {
    let pipeline = Pipeline::mock();
    let request = tp53(vec![r273h(), GenomicVariant::new("17", 7577120, "G", "A")]);

    let first = pipeline.analyze(request.clone()).await.unwrap();
    let mut second = pipeline.analyze(request).await.unwrap();
    second.completed_at = first.completed_at;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

// =============================================================================
// Annotation
// =============================================================================

#[tokio::test]
async fn test_failing_sources_leave_other_fields() {
    let sources = standard_annotation_sources();
    sources[1].fail_with(SourceError::Unavailable("maintenance".to_string()));
    sources[3].fail_with(SourceError::Http {
        status: 500,
        url: "http://conservation.test".to_string(),
    });
    let set = SourceSet {
        annotations: sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn AnnotationSource>)
            .collect(),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set).build();

    let result = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    let record = result.variants[0].annotation.as_ref().unwrap();

    assert!(record.fields.gnomad_af.is_some());
    assert!(record.fields.cadd_phred.is_some());
    assert!(record.fields.go_terms.is_some());
    assert!(record.fields.clinvar_significance.is_none());
    assert!(record.fields.phylop.is_none());
    assert!(!record.all_sources_failed);
    assert!(record.pathogenicity.is_some());

    let statuses: Vec<(&str, SourceStatus)> = record
        .sources
        .iter()
        .map(|o| (o.source.as_str(), o.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("gnomad", SourceStatus::Ok),
            ("clinvar", SourceStatus::Error),
            ("dbnsfp", SourceStatus::Ok),
            ("conservation", SourceStatus::Error),
            ("go", SourceStatus::Ok),
        ]
    );
}

#[tokio::test]
async fn test_all_sources_failing_yields_no_call() {
    let sources = standard_annotation_sources();
    for source in &sources {
        source.fail_with(SourceError::CircuitBreakerOpen);
    }
    let set = SourceSet {
        annotations: sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn AnnotationSource>)
            .collect(),
        ..SourceSet::mock()
    };
    let result = Pipeline::builder(set)
        .build()
        .analyze(tp53(vec![r273h()]))
        .await
        .unwrap();

    let record = result.variants[0].annotation.as_ref().unwrap();
    assert!(record.all_sources_failed);
    assert_eq!(record.pathogenicity, None);
    // Mapping is unaffected
    assert!(result.variants[0].is_mapped());
}

#[tokio::test]
async fn test_conservation_can_be_skipped() {
    let options = AnalysisOptions {
        include_conservation: false,
        ..Default::default()
    };
    let result = Pipeline::mock()
        .analyze(tp53(vec![r273h()]).with_options(options))
        .await
        .unwrap();
    let record = result.variants[0].annotation.as_ref().unwrap();
    assert_eq!(
        record.outcome("conservation").unwrap().status,
        SourceStatus::Skipped
    );
    assert!(record.fields.phylop.is_none());
    assert!(record.fields.gnomad_af.is_some());
}

// =============================================================================
// Resolution failures
// =============================================================================

#[rstest]
#[case::unknown("NOTAGENE", ErrorCode::UnknownGene)]
#[case::blank("  ", ErrorCode::UnknownGene)]
#[case::ambiguous("AMBIG1", ErrorCode::NoCanonicalTranscript)]
#[tokio::test]
async fn test_resolution_errors(#[case] gene: &str, #[case] code: ErrorCode) {
    let err = Pipeline::mock()
        .analyze(AnalysisRequest::new(gene, vec![r273h()]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), code);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_timeout() {
    let lookup = Arc::new(MockGeneLookup::with_test_data());
    lookup.set_delay(Duration::from_secs(30));
    let set = SourceSet {
        gene_lookup: lookup.clone(),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set)
        .settings(PipelineSettings {
            request_timeout_seconds: 2,
            ..Default::default()
        })
        .build();

    let err = pipeline.analyze(tp53(vec![r273h()])).await.unwrap_err();
    assert!(matches!(err, VarvizError::ResolutionTimeout { ref symbol, .. } if symbol == "TP53"));
    assert_eq!(lookup.calls(), 1);
}

#[tokio::test]
async fn test_lookup_failure_is_resolution_failure() {
    let lookup = Arc::new(MockGeneLookup::with_test_data());
    lookup.fail_with(SourceError::Timeout(Duration::from_secs(5)));
    let set = SourceSet {
        gene_lookup: lookup,
        ..SourceSet::mock()
    };
    let err = Pipeline::builder(set)
        .build()
        .analyze(tp53(vec![r273h()]))
        .await
        .unwrap_err();
    assert!(matches!(err, VarvizError::ResolutionFailed { .. }));
    assert_eq!(err.code(), ErrorCode::SourceTimeout);
}

#[tokio::test]
async fn test_resolved_gene_is_reused() {
    let lookup = Arc::new(MockGeneLookup::with_test_data());
    let set = SourceSet {
        gene_lookup: lookup.clone(),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set).build();
    pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    pipeline
        .analyze(AnalysisRequest::new("tp53", vec![r273h()]))
        .await
        .unwrap();
    assert_eq!(lookup.calls(), 1);
}

// =============================================================================
// Literature
// =============================================================================

#[tokio::test]
async fn test_literature_is_mined() {
    let result = Pipeline::mock().analyze(tp53(vec![r273h()])).await.unwrap();
    assert_eq!(result.literature_status, LiteratureStatus::Ok);
    assert_eq!(result.literature.len(), 3);
    let hotspot = result
        .literature
        .iter()
        .find(|e| e.pmid.as_deref() == Some("15607980"))
        .unwrap();
    assert!(!hotspot.mentions.is_empty());
}

#[tokio::test]
async fn test_literature_failure_does_not_fail_request() {
    let literature = Arc::new(MockLiteratureSource::with_test_data());
    literature.fail_with(SourceError::Unavailable("down".to_string()));
    let set = SourceSet {
        literature: Some(literature.clone()),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set).build();

    let result = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    assert!(result.literature.is_empty());
    assert!(matches!(
        result.literature_status,
        LiteratureStatus::Unavailable { .. }
    ));
    assert!(result.variants[0].is_mapped());

    // Failures are not cached; the next request asks again for TP53 and R273H
    literature.recover();
    let result = pipeline.analyze(tp53(vec![r273h()])).await.unwrap();
    assert_eq!(result.literature_status, LiteratureStatus::Ok);
    assert_eq!(literature.calls(), 4);
}

#[tokio::test]
async fn test_literature_searched_per_protein_change() {
    let literature = Arc::new(MockLiteratureSource::with_test_data());
    let set = SourceSet {
        literature: Some(literature.clone()),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set).build();

    // c.523C>T (codon 175 CAA>TAA) and R273H, the latter twice
    let q175_stop = GenomicVariant::new("17", 7577415, "G", "A");
    let result = pipeline
        .analyze(tp53(vec![q175_stop, r273h(), r273h()]))
        .await
        .unwrap();

    assert_eq!(
        result.variants[0].protein_change.as_ref().unwrap().hgvs_p(),
        "p.Gln175Ter"
    );
    assert_eq!(result.literature_status, LiteratureStatus::Ok);
    assert_eq!(result.literature.len(), 3);

    // Gene alone, Q175* and R273H
    let stats = pipeline.cache_stats().await.literature.unwrap();
    assert_eq!(stats.stored_keys, 3);
    assert_eq!(stats.upstream_calls, 3);
    assert_eq!(literature.calls(), 3);
}

#[tokio::test]
async fn test_literature_variant_cap() {
    let literature = Arc::new(MockLiteratureSource::with_test_data());
    let set = SourceSet {
        literature: Some(literature.clone()),
        ..SourceSet::mock()
    };
    let pipeline = Pipeline::builder(set)
        .settings(PipelineSettings {
            max_literature_variants: 1,
            ..Default::default()
        })
        .build();

    let q175_stop = GenomicVariant::new("17", 7577415, "G", "A");
    pipeline
        .analyze(tp53(vec![q175_stop, r273h()]))
        .await
        .unwrap();
    assert_eq!(literature.calls(), 2);
}

#[tokio::test]
async fn test_literature_skipped_when_not_requested() {
    let options = AnalysisOptions {
        include_literature: false,
        ..Default::default()
    };
    let result = Pipeline::mock()
        .analyze(tp53(vec![r273h()]).with_options(options))
        .await
        .unwrap();
    assert_eq!(result.literature_status, LiteratureStatus::Skipped);
    assert!(result.literature.is_empty());
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn test_progress_stream_ends_with_result() {
    let pipeline = Arc::new(Pipeline::mock());
    let variants = vec![r273h(); 5];
    let options = AnalysisOptions {
        batch_size: 2,
        ..Default::default()
    };
    let mut subscription = pipeline.analyze_with_progress(tp53(variants).with_options(options));

    let mut events = Vec::new();
    while let Some(event) = subscription.next().await {
        events.push(event);
    }

    let mapped: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Mapped { done, total } => Some((*done, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(mapped, vec![(2, 5), (4, 5), (5, 5)]);

    let stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StageFinished(stage) => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            Stage::Resolving,
            Stage::Mapping,
            Stage::Annotating,
            Stage::MiningLiterature,
            Stage::Assembling
        ]
    );

    match events.last() {
        Some(ProgressEvent::Completed(result)) => assert_eq!(result.variants.len(), 5),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_progress_stream_reports_failure() {
    let pipeline = Arc::new(Pipeline::mock());
    let err = pipeline
        .analyze_with_progress(AnalysisRequest::new("NOTAGENE", vec![r273h()]))
        .finish()
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownGene);
}
