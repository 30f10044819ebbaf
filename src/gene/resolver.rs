//! Gene resolver with an in-process cache of resolved contexts

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{normalize_symbol, select_canonical_transcript, select_uniprot, GeneContext, GeneRecord};
use crate::cache::{CacheStats, LruCache};
use crate::error::{SourceError, VarvizError};
use crate::structure::{Structure, StructureKind};

/// Gene symbol → transcripts and UniProt candidates
#[async_trait]
pub trait GeneLookup: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the symbol is unknown to the source
    async fn resolve(&self, symbol: &str) -> Result<Option<GeneRecord>, SourceError>;
}

/// UniProt accession → residue coordinates
#[async_trait]
pub trait StructureSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> StructureKind;

    /// `Ok(None)` means the source has no structure for this protein
    async fn fetch_structure(&self, uniprot: &str) -> Result<Option<Structure>, SourceError>;
}

/// Outcome of walking the structure sources
#[derive(Default)]
struct StructureSearch {
    structure: Option<Structure>,
    /// Sources that answered with an error rather than `Ok(None)`
    failed_sources: usize,
}

/// Resolves gene symbols, trying structure sources in registration order
pub struct GeneResolver {
    lookup: Arc<dyn GeneLookup>,
    structures: Vec<Arc<dyn StructureSource>>,
    cache: LruCache<(String, bool), Arc<GeneContext>>,
}

impl GeneResolver {
    pub fn new(
        lookup: Arc<dyn GeneLookup>,
        structures: Vec<Arc<dyn StructureSource>>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            lookup,
            structures,
            cache: LruCache::new(cache_capacity),
        }
    }

    /// Resolve a symbol into a [`GeneContext`]
    ///
    /// Structure sources are only queried when `include_structure` is set;
    /// their failures are logged and never fatal.
    pub async fn resolve(
        &self,
        symbol: &str,
        include_structure: bool,
    ) -> Result<Arc<GeneContext>, VarvizError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(VarvizError::UnknownGene { symbol });
        }

        let key = (symbol.clone(), include_structure);
        if let Some(ctx) = self.cache.get(&key) {
            debug!(gene = %symbol, "gene context cache hit");
            return Ok(ctx);
        }

        let record = self
            .lookup
            .resolve(&symbol)
            .await
            .map_err(|source| VarvizError::ResolutionFailed {
                symbol: symbol.clone(),
                source,
            })?
            .ok_or_else(|| VarvizError::UnknownGene {
                symbol: symbol.clone(),
            })?;

        let uniprot = select_uniprot(&record.uniprot_candidates, &symbol)
            .ok_or_else(|| VarvizError::UnknownGene {
                symbol: symbol.clone(),
            })?
            .accession
            .clone();

        let transcript = select_canonical_transcript(&symbol, &record.transcripts)?.clone();
        let protein_length = transcript.protein_length().unwrap_or(0);

        let search = if include_structure {
            self.fetch_structure(&symbol, &uniprot).await
        } else {
            StructureSearch::default()
        };
        let cacheable = search.structure.is_some() || search.failed_sources == 0;
        let structure = search.structure;

        info!(
            gene = %symbol,
            transcript = %transcript.id,
            uniprot = %uniprot,
            structure = structure.as_ref().map(|s| s.reference.identifier.as_str()).unwrap_or("none"),
            "resolved gene"
        );

        let ctx = Arc::new(GeneContext {
            symbol,
            transcript,
            uniprot,
            protein_length,
            structure,
        });
        if cacheable {
            self.cache.insert(key, Arc::clone(&ctx));
        } else {
            debug!(gene = %ctx.symbol, "structure sources failed; context not cached");
        }
        Ok(ctx)
    }

    async fn fetch_structure(&self, symbol: &str, uniprot: &str) -> StructureSearch {
        let mut failed_sources = 0;
        for source in &self.structures {
            match source.fetch_structure(uniprot).await {
                Ok(Some(structure)) => {
                    debug!(
                        gene = %symbol,
                        source = source.name(),
                        residues = structure.residue_count(),
                        "structure found"
                    );
                    return StructureSearch {
                        structure: Some(structure),
                        failed_sources,
                    };
                }
                Ok(None) => {
                    debug!(gene = %symbol, source = source.name(), "no structure from source");
                }
                Err(e) => {
                    warn!(gene = %symbol, source = source.name(), error = %e, "structure source failed");
                    failed_sources += 1;
                }
            }
        }
        warn!(gene = %symbol, uniprot = %uniprot, failed_sources, "no structure available");
        StructureSearch {
            structure: None,
            failed_sources,
        }
    }

    /// Drop cached contexts; `None` clears every gene
    pub fn invalidate(&self, symbol: Option<&str>) -> usize {
        match symbol {
            Some(s) => {
                let s = normalize_symbol(s);
                self.cache.remove_where(|(k, _)| *k == s)
            }
            None => self.cache.clear(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
