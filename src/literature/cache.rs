//! Literature cache with at most one miner per key
//!
//! A lookup first reads the store. On a miss the caller takes the per-key
//! async mutex, reads the store again (another caller may have filled it
//! meanwhile) and only then goes upstream. Concurrent callers for one key
//! therefore cost a single upstream search.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::mining::mine;
use super::source::LiteratureSource;
use super::store::{ClearScope, LiteratureStore, StoredLiterature};
use super::types::{LiteratureEntry, LiteratureKey, LiteratureStatus, SearchParams};
use crate::error::VarvizError;

/// When a stored value stops counting as a hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Stored values never expire
    #[default]
    Never,
    /// Values older than `max_age_secs` are mined again
    MaxAge { max_age_secs: u64 },
}

impl EvictionPolicy {
    fn is_expired(&self, value: &StoredLiterature) -> bool {
        match self {
            EvictionPolicy::Never => false,
            EvictionPolicy::MaxAge { max_age_secs } => {
                let age = Utc::now().signed_duration_since(value.created_at);
                age.to_std()
                    .map(|age| age > Duration::from_secs(*max_age_secs))
                    .unwrap_or(false)
            }
        }
    }
}

/// Counters since the cache was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteratureCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Searches actually sent to the literature source
    pub upstream_calls: u64,
    /// Keys currently persisted
    pub stored_keys: usize,
}

/// Result of one literature lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LiteratureLookup {
    pub entries: Vec<LiteratureEntry>,
    pub status: LiteratureStatus,
}

pub struct LiteratureCache {
    source: Arc<dyn LiteratureSource>,
    store: Arc<dyn LiteratureStore>,
    policy: EvictionPolicy,
    locks: Mutex<HashMap<LiteratureKey, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_calls: AtomicU64,
}

impl LiteratureCache {
    pub fn new(
        source: Arc<dyn LiteratureSource>,
        store: Arc<dyn LiteratureStore>,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
            locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            upstream_calls: AtomicU64::new(0),
        }
    }

    /// Serve literature for (gene, variant, params), mining on a miss
    ///
    /// Never fails: an unavailable source yields an empty list with
    /// [`LiteratureStatus::Unavailable`] and nothing is persisted.
    pub async fn get_or_mine(
        &self,
        gene: &str,
        variant: Option<&str>,
        params: &SearchParams,
    ) -> LiteratureLookup {
        let key = LiteratureKey::new(gene, variant, params);

        if let Some(entries) = self.lookup(&key).await {
            return self.hit(&key, entries);
        }

        let held = KeyLock::acquire(self, key);
        let _guard = held.lock.lock().await;
        let lookup = match self.lookup(&held.key).await {
            Some(entries) => self.hit(&held.key, entries),
            None => self.mine_and_store(held.key.clone(), params).await,
        };
        lookup
    }

    async fn lookup(&self, key: &LiteratureKey) -> Option<Vec<LiteratureEntry>> {
        match self.store.load(key).await {
            Ok(Some(value)) if self.policy.is_expired(&value) => {
                debug!(key = %key, created_at = %value.created_at, "literature cache entry expired");
                None
            }
            Ok(Some(value)) => Some(value.entries),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "literature cache read failed; treating as miss");
                None
            }
        }
    }

    fn hit(&self, key: &LiteratureKey, entries: Vec<LiteratureEntry>) -> LiteratureLookup {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, entries = entries.len(), "literature cache hit");
        LiteratureLookup {
            entries,
            status: LiteratureStatus::Ok,
        }
    }

    async fn mine_and_store(&self, key: LiteratureKey, params: &SearchParams) -> LiteratureLookup {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, source = self.source.name(), "literature cache miss");

        let publications = match self
            .source
            .search(&key.gene, key.variant.as_deref(), params)
            .await
        {
            Ok(publications) => publications,
            Err(e) => {
                warn!(key = %key, source = self.source.name(), error = %e, "literature source unavailable");
                return LiteratureLookup {
                    entries: Vec::new(),
                    status: LiteratureStatus::Unavailable {
                        reason: e.to_string(),
                    },
                };
            }
        };

        let found = publications.len();
        let entries = mine(publications, &key.gene, key.variant.as_deref(), params);
        info!(key = %key, publications = found, entries = entries.len(), "literature mined");

        let value = StoredLiterature {
            key,
            created_at: Utc::now(),
            entries,
        };
        if let Err(e) = self.store.save(&value).await {
            warn!(key = %value.key, error = %e, "could not persist literature");
        }
        LiteratureLookup {
            entries: value.entries,
            status: LiteratureStatus::Ok,
        }
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub async fn clear(&self, scope: &ClearScope) -> Result<usize, VarvizError> {
        let removed = self.store.clear(scope).await?;
        info!(scope = ?scope, removed, "literature cache cleared");
        Ok(removed)
    }

    pub async fn stats(&self) -> LiteratureCacheStats {
        let stored_keys = match self.store.len().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "could not count stored literature");
                0
            }
        };
        LiteratureCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            stored_keys,
        }
    }
}

/// Per-key mutex handle; dropping it forgets the mutex once nobody else holds it
///
/// Runs on every exit path, including a caller dropping the lookup future
/// at a deadline.
struct KeyLock<'a> {
    cache: &'a LiteratureCache,
    key: LiteratureKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> KeyLock<'a> {
    fn acquire(cache: &'a LiteratureCache, key: LiteratureKey) -> Self {
        let mut locks = cache.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = Arc::clone(locks.entry(key.clone()).or_default());
        drop(locks);
        Self { cache, key, lock }
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.cache.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map's handle plus ours
        let unused = locks
            .get(&self.key)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if unused {
            locks.remove(&self.key);
        }
    }
}
