//! Upstream data sources
//!
//! HTTP-backed implementations of the resolver, annotation and literature
//! traits, plus in-memory mocks for tests and offline runs. [`SourceSet`]
//! bundles one of each for the pipeline.

pub mod alphafold;
pub mod ensembl;
pub mod europepmc;
pub mod http_client;
pub mod mock;
pub mod myvariant;
pub mod sifts;
pub mod uniprot;

use std::sync::Arc;

use crate::annotation::{AnnotationSource, SourceKind};
use crate::config::PipelineConfig;
use crate::error::VarvizError;
use crate::gene::{GeneLookup, StructureSource};
use crate::literature::LiteratureSource;

pub use alphafold::{AlphaFoldSource, RcsbStructureSource};
pub use ensembl::EnsemblGeneLookup;
pub use europepmc::EuropePmcSource;
pub use http_client::{CircuitBreaker, CircuitState, ClientStats, HttpClient};
pub use myvariant::MyVariantSource;
pub use uniprot::UniprotGoSource;

/// Every upstream the pipeline talks to
#[derive(Clone)]
pub struct SourceSet {
    pub gene_lookup: Arc<dyn GeneLookup>,
    /// Tried in order until one returns a structure
    pub structures: Vec<Arc<dyn StructureSource>>,
    /// Merged in registration order
    pub annotations: Vec<Arc<dyn AnnotationSource>>,
    /// `None` when literature search is disabled
    pub literature: Option<Arc<dyn LiteratureSource>>,
}

impl SourceSet {
    /// Build the HTTP sources enabled in `config`, sharing one client
    pub fn from_config(config: &PipelineConfig) -> Result<Self, VarvizError> {
        let sources = &config.sources;
        if !sources.ensembl.enabled {
            return Err(VarvizError::Config {
                msg: "sources.ensembl must be enabled to resolve genes".to_string(),
            });
        }
        let client = Arc::new(
            HttpClient::new(&config.http).map_err(|e| VarvizError::Config { msg: e.to_string() })?,
        );

        let gene_lookup: Arc<dyn GeneLookup> = Arc::new(EnsemblGeneLookup::new(
            client.clone(),
            sources.ensembl.clone(),
            sources.uniprot.clone(),
        ));

        let mut structures: Vec<Arc<dyn StructureSource>> = Vec::new();
        if sources.alphafold.enabled {
            structures.push(Arc::new(AlphaFoldSource::new(
                client.clone(),
                sources.alphafold.clone(),
            )));
        }
        if sources.rcsb.enabled && sources.uniprot.enabled && sources.sifts.enabled {
            structures.push(Arc::new(RcsbStructureSource::new(
                client.clone(),
                sources.rcsb.clone(),
                sources.uniprot.clone(),
                sources.sifts.clone(),
            )));
        }

        let mut annotations: Vec<Arc<dyn AnnotationSource>> = Vec::new();
        if sources.myvariant.enabled {
            for source in MyVariantSource::all(client.clone(), &sources.myvariant) {
                if source.kind() == SourceKind::Conservation && !sources.conservation {
                    continue;
                }
                annotations.push(Arc::new(source));
            }
        }
        if sources.go_terms.enabled {
            annotations.push(Arc::new(UniprotGoSource::new(
                client.clone(),
                &sources.go_terms.base_url,
                sources.go_terms.timeout(),
            )));
        }

        let literature: Option<Arc<dyn LiteratureSource>> = sources
            .europepmc
            .enabled
            .then(|| Arc::new(EuropePmcSource::new(client, sources.europepmc.clone())) as Arc<dyn LiteratureSource>);

        Ok(Self {
            gene_lookup,
            structures,
            annotations,
            literature,
        })
    }

    /// In-memory fixtures: TP53, DEMO1 and AMBIG1 with five annotation sources
    pub fn mock() -> Self {
        Self {
            gene_lookup: Arc::new(mock::MockGeneLookup::with_test_data()),
            structures: vec![
                Arc::new(mock::MockStructureSource::alphafold_test_data()),
                Arc::new(mock::MockStructureSource::pdb_test_data()),
            ],
            annotations: mock::standard_annotation_sources()
                .into_iter()
                .map(|s| s as Arc<dyn AnnotationSource>)
                .collect(),
            literature: Some(Arc::new(mock::MockLiteratureSource::with_test_data())),
        }
    }

    pub fn annotation_source_names(&self) -> Vec<&str> {
        self.annotations.iter().map(|s| s.name()).collect()
    }
}
