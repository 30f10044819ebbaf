//! Persistence for mined literature
//!
//! The file store keeps one JSON document per key under
//! `<root>/<GENE>/<sha256(key)>.json`. Documents are written to a temporary
//! file first and renamed into place, so readers never see partial writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{LiteratureEntry, LiteratureKey};
use crate::error::VarvizError;

/// A persisted cache value; never mutated after it is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLiterature {
    pub key: LiteratureKey,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<LiteratureEntry>,
}

/// Which cached literature to drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    All,
    Gene(String),
    Key(LiteratureKey),
}

#[async_trait]
pub trait LiteratureStore: Send + Sync {
    async fn load(&self, key: &LiteratureKey) -> Result<Option<StoredLiterature>, VarvizError>;

    async fn save(&self, value: &StoredLiterature) -> Result<(), VarvizError>;

    /// Returns the number of keys removed
    async fn clear(&self, scope: &ClearScope) -> Result<usize, VarvizError>;

    async fn len(&self) -> Result<usize, VarvizError>;
}

/// In-process store, lost on exit
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<LiteratureKey, StoredLiterature>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LiteratureStore for MemoryStore {
    async fn load(&self, key: &LiteratureKey) -> Result<Option<StoredLiterature>, VarvizError> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn save(&self, value: &StoredLiterature) -> Result<(), VarvizError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(value.key.clone(), value.clone());
        Ok(())
    }

    async fn clear(&self, scope: &ClearScope) -> Result<usize, VarvizError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let before = values.len();
        match scope {
            ClearScope::All => values.clear(),
            ClearScope::Gene(gene) => {
                let gene = crate::gene::normalize_symbol(gene);
                values.retain(|k, _| k.gene != gene);
            }
            ClearScope::Key(key) => {
                values.remove(key);
            }
        }
        Ok(before - values.len())
    }

    async fn len(&self) -> Result<usize, VarvizError> {
        Ok(self.values.read().unwrap_or_else(|e| e.into_inner()).len())
    }
}

/// One JSON file per key on local disk
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn gene_dir(&self, gene: &str) -> PathBuf {
        self.root.join(sanitize_component(gene))
    }

    /// Location of the document for `key`
    pub fn path_for(&self, key: &LiteratureKey) -> PathBuf {
        self.gene_dir(&key.gene).join(format!("{}.json", key.digest()))
    }

    async fn gene_dirs(&self) -> Result<Vec<PathBuf>, VarvizError> {
        let mut dirs = Vec::new();
        let mut reader = match tokio::fs::read_dir(&self.root).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = reader.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    async fn json_files(dir: &Path) -> Result<Vec<PathBuf>, VarvizError> {
        let mut files = Vec::new();
        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove_files(files: Vec<PathBuf>) -> Result<usize, VarvizError> {
        let mut removed = 0;
        for file in files {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl LiteratureStore for JsonFileStore {
    async fn load(&self, key: &LiteratureKey) -> Result<Option<StoredLiterature>, VarvizError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredLiterature = serde_json::from_slice(&bytes)?;
        if stored.key != *key {
            warn!(path = %path.display(), "literature cache file holds a different key");
            return Ok(None);
        }
        Ok(Some(stored))
    }

    async fn save(&self, value: &StoredLiterature) -> Result<(), VarvizError> {
        let path = self.path_for(&value.key);
        let dir = self.gene_dir(&value.key.gene);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), entries = value.entries.len(), "literature persisted");
        Ok(())
    }

    async fn clear(&self, scope: &ClearScope) -> Result<usize, VarvizError> {
        match scope {
            ClearScope::Key(key) => Self::remove_files(vec![self.path_for(key)]).await,
            ClearScope::Gene(gene) => {
                let dir = self.gene_dir(&crate::gene::normalize_symbol(gene));
                Self::remove_files(Self::json_files(&dir).await?).await
            }
            ClearScope::All => {
                let mut removed = 0;
                for dir in self.gene_dirs().await? {
                    removed += Self::remove_files(Self::json_files(&dir).await?).await?;
                }
                Ok(removed)
            }
        }
    }

    async fn len(&self) -> Result<usize, VarvizError> {
        let mut count = 0;
        for dir in self.gene_dirs().await? {
            count += Self::json_files(&dir).await?.len();
        }
        Ok(count)
    }
}

/// Keep gene directory names to a safe character set
fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literature::types::SearchParams;
    use tempfile::TempDir;

    fn stored(gene: &str, variant: Option<&str>) -> StoredLiterature {
        StoredLiterature {
            key: LiteratureKey::new(gene, variant, &SearchParams::default()),
            created_at: Utc::now(),
            entries: vec![LiteratureEntry {
                pmid: Some("12345".to_string()),
                pmcid: None,
                title: "A study".to_string(),
                authors: vec!["Doe J".to_string()],
                year: Some(2020),
                journal: None,
                mentions: vec![],
                relevance: 1.0,
                functional_summary: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let value = stored("TP53", Some("R273H"));

        assert!(store.load(&value.key).await.unwrap().is_none());
        store.save(&value).await.unwrap();

        let path = store.path_for(&value.key);
        assert!(path.starts_with(dir.path().join("TP53")));
        assert!(path.exists());
        assert_eq!(store.load(&value.key).await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_file_store_clear_scopes() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let a = stored("TP53", Some("R273H"));
        let b = stored("TP53", None);
        let c = stored("BRCA1", None);
        for v in [&a, &b, &c] {
            store.save(v).await.unwrap();
        }
        assert_eq!(store.len().await.unwrap(), 3);

        assert_eq!(store.clear(&ClearScope::Key(a.key.clone())).await.unwrap(), 1);
        assert_eq!(store.clear(&ClearScope::Gene("tp53".to_string())).await.unwrap(), 1);
        assert_eq!(store.clear(&ClearScope::All).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("not-created"));
        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(store.clear(&ClearScope::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let value = stored("TP53", None);
        let path = store.path_for(&value.key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            store.load(&value.key).await,
            Err(VarvizError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        let value = stored("TP53", None);
        store.save(&value).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.load(&value.key).await.unwrap().is_some());
        assert_eq!(store.clear(&ClearScope::Gene("TP53".to_string())).await.unwrap(), 1);
        assert!(store.load(&value.key).await.unwrap().is_none());
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("HLA-A"), "HLA-A");
        assert_eq!(sanitize_component("../etc"), "___etc");
        assert_eq!(sanitize_component(""), "_");
    }
}
