//! Stage sequencing, deadlines and result assembly

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use futures_util::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::events::{ProgressEvent, ProgressSink, ProgressSubscription, Stage, PROGRESS_CHANNEL_CAPACITY};
use super::result::{AnalysisOptions, AnalysisRequest, AnalysisResult};
use crate::annotation::{AnnotationAggregator, AnnotationRecord};
use crate::cache::CacheStats;
use crate::config::{PipelineConfig, PipelineSettings};
use crate::error::VarvizError;
use crate::gene::{normalize_symbol, GeneContext, GeneResolver};
use crate::literature::mining::{canonical_variant, merge_entries};
use crate::literature::{
    ClearScope, EvictionPolicy, JsonFileStore, LiteratureCache, LiteratureCacheStats,
    LiteratureEntry, LiteratureLookup, LiteratureStatus, LiteratureStore, MemoryStore,
    SearchParams,
};
use crate::mapper::{MappedVariant, MappingOptions, UnmappedReason};
use crate::sources::SourceSet;
use crate::variant::GenomicVariant;

/// Cache counters across the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCacheStats {
    pub genes: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literature: Option<LiteratureCacheStats>,
}

/// What a cache clear removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub genes: usize,
    pub literature: usize,
}

pub struct PipelineBuilder {
    sources: SourceSet,
    settings: PipelineSettings,
    store: Option<Arc<dyn LiteratureStore>>,
    eviction: EvictionPolicy,
    search_params: SearchParams,
}

impl PipelineBuilder {
    pub fn new(sources: SourceSet) -> Self {
        Self {
            sources,
            settings: PipelineSettings::default(),
            store: None,
            eviction: EvictionPolicy::default(),
            search_params: SearchParams::default(),
        }
    }

    /// HTTP sources, settings and the literature store described by `config`
    pub fn from_config(config: &PipelineConfig) -> Result<Self, VarvizError> {
        config.validate()?;
        Ok(Self::configured(SourceSet::from_config(config)?, config))
    }

    /// Given sources with the settings and literature store from `config`
    pub fn configured(sources: SourceSet, config: &PipelineConfig) -> Self {
        let store: Arc<dyn LiteratureStore> = match &config.literature.cache_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(sources)
            .settings(config.pipeline.clone())
            .literature_store(store)
            .eviction(config.literature.eviction)
            .search_params(config.literature.search_params())
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn literature_store(mut self, store: Arc<dyn LiteratureStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn search_params(mut self, params: SearchParams) -> Self {
        self.search_params = params;
        self
    }

    pub fn build(self) -> Pipeline {
        let resolver = GeneResolver::new(
            self.sources.gene_lookup,
            self.sources.structures,
            self.settings.gene_cache_capacity,
        );
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let literature = self
            .sources
            .literature
            .map(|source| LiteratureCache::new(source, store, self.eviction));
        Pipeline {
            resolver,
            aggregator: Arc::new(AnnotationAggregator::new(self.sources.annotations)),
            literature,
            settings: self.settings,
            search_params: self.search_params,
        }
    }
}

/// Gene resolution, mapping, annotation and literature for one request at a time
pub struct Pipeline {
    resolver: GeneResolver,
    aggregator: Arc<AnnotationAggregator>,
    literature: Option<LiteratureCache>,
    settings: PipelineSettings,
    search_params: SearchParams,
}

impl Pipeline {
    pub fn builder(sources: SourceSet) -> PipelineBuilder {
        PipelineBuilder::new(sources)
    }

    /// Pipeline over the in-memory fixtures
    pub fn mock() -> Self {
        PipelineBuilder::new(SourceSet::mock()).build()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one analysis to completion
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, VarvizError> {
        self.run(request, &ProgressSink::default()).await
    }

    /// Run one analysis on its own task, reporting progress
    ///
    /// Dropping the returned subscription aborts the analysis.
    pub fn analyze_with_progress(self: &Arc<Self>, request: AnalysisRequest) -> ProgressSubscription {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let pipeline = Arc::clone(self);
        let task = tokio::spawn(async move {
            let sink = ProgressSink::new(tx);
            let terminal = match pipeline.run(request, &sink).await {
                Ok(result) => ProgressEvent::Completed(Box::new(result)),
                Err(err) => ProgressEvent::Failed(err),
            };
            sink.emit(terminal).await;
        });
        ProgressSubscription::new(rx, task)
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        sink: &ProgressSink,
    ) -> Result<AnalysisResult, VarvizError> {
        let deadline = Instant::now() + self.settings.request_timeout();
        let options = request.options;
        let total = request.variants.len();
        info!(gene = %request.gene, variants = total, "analysis started");

        let ctx = self.resolve(&request.gene, options, deadline).await?;
        sink.emit(ProgressEvent::StageFinished(Stage::Resolving)).await;

        let mapped = self.map_variants(&ctx, request.variants, options, sink).await?;
        sink.emit(ProgressEvent::StageFinished(Stage::Mapping)).await;

        let annotations = self.annotate(&ctx, &mapped, options, deadline, sink).await;
        sink.emit(ProgressEvent::StageFinished(Stage::Annotating)).await;

        let (literature, literature_status) = self.mine_literature(&ctx, &mapped, options, deadline).await;
        sink.emit(ProgressEvent::LiteratureReady {
            entries: literature.len(),
            status: literature_status.clone(),
        })
        .await;
        sink.emit(ProgressEvent::StageFinished(Stage::MiningLiterature)).await;

        let variants: Vec<MappedVariant> = mapped
            .into_iter()
            .zip(annotations)
            .map(|(variant, record)| variant.with_annotation(record))
            .collect();
        sink.emit(ProgressEvent::StageFinished(Stage::Assembling)).await;

        let result = AnalysisResult {
            gene: GeneContext::clone(&ctx),
            variants,
            literature,
            literature_status,
            completed_at: Utc::now(),
        };
        info!(
            gene = %result.gene.symbol,
            variants = total,
            mapped = result.mapped_count(),
            literature = result.literature.len(),
            "analysis complete"
        );
        Ok(result)
    }

    /// Resolve under the request deadline; failures here abort the request
    async fn resolve(
        &self,
        gene: &str,
        options: AnalysisOptions,
        deadline: Instant,
    ) -> Result<Arc<GeneContext>, VarvizError> {
        let started = Instant::now();
        let resolved = timeout_at(deadline, self.resolver.resolve(gene, options.include_structure))
            .await
            .unwrap_or_else(|_| {
                Err(VarvizError::ResolutionTimeout {
                    symbol: normalize_symbol(gene),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            });
        if let Err(e) = &resolved {
            warn!(gene, code = %e.code(), error = %e, "gene resolution failed");
        }
        resolved
    }

    /// Map in chunks of `batch_size` on the blocking pool
    async fn map_variants(
        &self,
        ctx: &Arc<GeneContext>,
        variants: Vec<GenomicVariant>,
        options: AnalysisOptions,
        sink: &ProgressSink,
    ) -> Result<Vec<MappedVariant>, VarvizError> {
        let total = variants.len();
        let mapping = MappingOptions {
            include_structure: options.include_structure,
            nearby_radius: self.settings.nearby_radius,
            nearby_limit: self.settings.nearby_limit,
        };
        let batch_size = options.batch_size.max(1);

        let mut mapped = Vec::with_capacity(total);
        for (n, chunk) in variants.chunks(batch_size).enumerate() {
            let ctx = Arc::clone(ctx);
            let chunk = chunk.to_vec();
            let first_index = n * batch_size;
            let batch = tokio::task::spawn_blocking(move || map_chunk(&ctx, mapping, &chunk, first_index)).await?;
            mapped.extend(batch);
            sink.emit(ProgressEvent::Mapped {
                done: mapped.len(),
                total,
            })
            .await;
        }
        debug!(
            gene = %ctx.symbol,
            mapped = mapped.iter().filter(|v| v.is_mapped()).count(),
            total,
            "mapping finished"
        );
        Ok(mapped)
    }

    /// One record per variant, in input order; invalid variants are not sent upstream
    async fn annotate(
        &self,
        ctx: &Arc<GeneContext>,
        mapped: &[MappedVariant],
        options: AnalysisOptions,
        deadline: Instant,
        sink: &ProgressSink,
    ) -> Vec<AnnotationRecord> {
        let total = mapped.len();
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_annotations.max(1)));
        let mut records: Vec<Option<AnnotationRecord>> = vec![None; total];
        let mut tasks = JoinSet::new();

        for (slot, variant) in mapped.iter().enumerate() {
            if variant.unmapped == Some(UnmappedReason::InvalidVariant) {
                records[slot] = Some(self.aggregator.skipped_record("invalid variant"));
                continue;
            }
            let aggregator = Arc::clone(&self.aggregator);
            let ctx = Arc::clone(ctx);
            let permits = Arc::clone(&permits);
            let genomic = variant.variant.clone();
            tasks.spawn(async move {
                let record = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        aggregator
                            .annotate(&genomic, &ctx, options.include_conservation, deadline)
                            .await
                    }
                    Err(_) => aggregator.skipped_record("annotation limiter closed"),
                };
                (slot, record)
            });
        }

        let mut done = total - tasks.len();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, record)) => records[slot] = Some(record),
                Err(e) => warn!(error = %e, "annotation task failed"),
            }
            done += 1;
            sink.emit(ProgressEvent::Annotated { done, total }).await;
        }

        records
            .into_iter()
            .map(|r| r.unwrap_or_else(|| self.aggregator.skipped_record("annotation task failed")))
            .collect()
    }

    /// Literature for the gene alone and for each distinct protein change
    ///
    /// The keys are searched concurrently under the request deadline.
    async fn mine_literature(
        &self,
        ctx: &GeneContext,
        mapped: &[MappedVariant],
        options: AnalysisOptions,
        deadline: Instant,
    ) -> (Vec<LiteratureEntry>, LiteratureStatus) {
        if !options.include_literature {
            return (Vec::new(), LiteratureStatus::Skipped);
        }
        let Some(cache) = &self.literature else {
            return (
                Vec::new(),
                LiteratureStatus::Unavailable {
                    reason: "no literature source configured".to_string(),
                },
            );
        };

        let mut keys: Vec<Option<String>> = vec![None];
        keys.extend(
            literature_variants(mapped, self.settings.max_literature_variants)
                .into_iter()
                .map(Some),
        );
        debug!(gene = %ctx.symbol, keys = keys.len(), "searching literature");

        let lookups = keys
            .iter()
            .map(|variant| cache.get_or_mine(&ctx.symbol, variant.as_deref(), &self.search_params));
        match timeout_at(deadline, join_all(lookups)).await {
            Ok(lookups) => merge_lookups(lookups),
            Err(_) => {
                warn!(gene = %ctx.symbol, "request deadline reached during literature search");
                (
                    Vec::new(),
                    LiteratureStatus::Unavailable {
                        reason: "request deadline exceeded".to_string(),
                    },
                )
            }
        }
    }

    /// Drop cached state; gene-scoped clears also forget the resolved context
    pub async fn clear_cache(&self, scope: ClearScope) -> Result<ClearReport, VarvizError> {
        let genes = match &scope {
            ClearScope::All => self.resolver.invalidate(None),
            ClearScope::Gene(gene) => self.resolver.invalidate(Some(gene.as_str())),
            ClearScope::Key(_) => 0,
        };
        let literature = match &self.literature {
            Some(cache) => cache.clear(&scope).await?,
            None => 0,
        };
        Ok(ClearReport { genes, literature })
    }

    pub async fn cache_stats(&self) -> PipelineCacheStats {
        let literature = match &self.literature {
            Some(cache) => Some(cache.stats().await),
            None => None,
        };
        PipelineCacheStats {
            genes: self.resolver.cache_stats(),
            literature,
        }
    }
}

/// Distinct compact protein changes in input order, e.g. "R273H"
fn literature_variants(mapped: &[MappedVariant], limit: usize) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    for change in mapped.iter().filter_map(|v| v.protein_change.as_ref()) {
        if variants.len() == limit {
            break;
        }
        let variant = canonical_variant(&change.hgvs_p());
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

/// Ok when any key was served; otherwise the first failure
fn merge_lookups(lookups: Vec<LiteratureLookup>) -> (Vec<LiteratureEntry>, LiteratureStatus) {
    let status = if lookups.iter().any(|l| l.status.is_ok()) {
        LiteratureStatus::Ok
    } else {
        lookups
            .first()
            .map(|l| l.status.clone())
            .unwrap_or(LiteratureStatus::Ok)
    };
    let entries = merge_entries(lookups.into_iter().map(|l| l.entries));
    (entries, status)
}

#[cfg(feature = "parallel")]
fn map_chunk(
    ctx: &GeneContext,
    options: MappingOptions,
    variants: &[GenomicVariant],
    first_index: usize,
) -> Vec<MappedVariant> {
    crate::parallel::map_variants_parallel(ctx, options, variants, first_index)
}

#[cfg(not(feature = "parallel"))]
fn map_chunk(
    ctx: &GeneContext,
    options: MappingOptions,
    variants: &[GenomicVariant],
    first_index: usize,
) -> Vec<MappedVariant> {
    let mapper = crate::mapper::CoordinateMapper::new(ctx, options);
    variants
        .iter()
        .enumerate()
        .map(|(i, v)| mapper.map(first_index + i, v))
        .collect()
}
