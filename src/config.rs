//! Configuration file support for varviz.
//!
//! # Example Configuration
//!
//! ```toml
//! [pipeline]
//! request_timeout_seconds = 120
//! max_concurrent_annotations = 16
//!
//! [http]
//! rate_limit_ms = 50
//!
//! [http.circuit_breaker]
//! failure_threshold = 5
//!
//! [sources.myvariant]
//! enabled = true
//! base_url = "https://myvariant.info"
//! timeout_seconds = 10
//!
//! [literature]
//! cache_dir = "/var/cache/varviz/literature"
//! eviction = { policy = "max_age", max_age_secs = 604800 }
//! ```
//!
//! # Config File Locations
//!
//! Configuration is searched in this order (first found wins):
//! 1. `.varviz.toml` in current directory
//! 2. `~/.config/varviz/config.toml`
//!
//! CLI flags take precedence over config file settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::VarvizError;
use crate::literature::{EvictionPolicy, SearchParams, DEFAULT_SEARCH_DEPTH};
use crate::structure::{DEFAULT_NEARBY_LIMIT, DEFAULT_NEARBY_RADIUS};

/// Errors loading or checking configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(String),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for VarvizError {
    fn from(err: ConfigError) -> Self {
        VarvizError::Config {
            msg: err.to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineSettings,
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub literature: LiteratureConfig,
}

/// Request-level limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Deadline for a whole analysis request (default: 120)
    pub request_timeout_seconds: u64,
    /// Variants annotated concurrently (default: 16)
    pub max_concurrent_annotations: usize,
    /// Variants per mapping chunk (default: 100)
    pub batch_size: usize,
    /// Resolved genes kept in memory (default: 128)
    pub gene_cache_capacity: usize,
    /// Neighbour search radius in Ångström (default: 8.0)
    pub nearby_radius: f64,
    /// Neighbours reported per residue (default: 10)
    pub nearby_limit: usize,
    /// Distinct protein changes searched in the literature besides the gene itself (default: 5)
    pub max_literature_variants: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 120,
            max_concurrent_annotations: 16,
            batch_size: 100,
            gene_cache_capacity: 128,
            nearby_radius: DEFAULT_NEARBY_RADIUS,
            nearby_limit: DEFAULT_NEARBY_LIMIT,
            max_literature_variants: 5,
        }
    }
}

impl PipelineSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Minimum delay between requests in milliseconds
    pub rate_limit_ms: Option<u64>,
    /// Requests in flight at once (default: 8)
    pub max_in_flight: usize,
    pub connection_pool: ConnectionPoolConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("varviz/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit_ms: None,
            max_in_flight: 8,
            connection_pool: ConnectionPoolConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// HTTP connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    /// Idle connections kept per host (default: 10)
    pub max_idle_per_host: usize,
    /// Connection idle timeout in seconds (default: 30)
    pub idle_timeout_seconds: u64,
    /// TCP keep-alive in seconds (default: 90)
    pub keep_alive_seconds: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout_seconds: 30,
            keep_alive_seconds: 90,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit (default: 5)
    pub failure_threshold: u32,
    /// Seconds before an open circuit lets a probe through (default: 60)
    pub recovery_timeout_seconds: u64,
    /// Successful probes needed to close the circuit again (default: 3)
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_seconds: 60,
            success_threshold: 3,
        }
    }
}

/// One upstream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Per-call timeout in seconds
    pub timeout_seconds: u64,
}

impl SourceConfig {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Self {
        Self {
            enabled: true,
            base_url: base_url.to_string(),
            timeout_seconds,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Upstream endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub ensembl: SourceConfig,
    pub uniprot: SourceConfig,
    pub alphafold: SourceConfig,
    /// Coordinate downloads for experimental structures
    pub rcsb: SourceConfig,
    /// PDBe SIFTS residue mappings for experimental structures
    pub sifts: SourceConfig,
    pub myvariant: SourceConfig,
    /// When false, conservation scores are not requested at all
    pub conservation: bool,
    pub go_terms: SourceConfig,
    pub europepmc: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ensembl: SourceConfig::new("https://rest.ensembl.org", 30),
            uniprot: SourceConfig::new("https://rest.uniprot.org", 15),
            alphafold: SourceConfig::new("https://alphafold.ebi.ac.uk", 30),
            rcsb: SourceConfig::new("https://files.rcsb.org", 30),
            sifts: SourceConfig::new("https://www.ebi.ac.uk/pdbe/api", 15),
            myvariant: SourceConfig::new("https://myvariant.info", 10),
            conservation: true,
            go_terms: SourceConfig::new("https://rest.uniprot.org", 10),
            europepmc: SourceConfig::new("https://www.ebi.ac.uk/europepmc/webservices/rest", 20),
        }
    }
}

impl SourcesConfig {
    fn all(&self) -> [(&'static str, &SourceConfig); 8] {
        [
            ("ensembl", &self.ensembl),
            ("uniprot", &self.uniprot),
            ("alphafold", &self.alphafold),
            ("rcsb", &self.rcsb),
            ("sifts", &self.sifts),
            ("myvariant", &self.myvariant),
            ("go_terms", &self.go_terms),
            ("europepmc", &self.europepmc),
        ]
    }
}

/// Literature cache settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LiteratureConfig {
    /// Directory of the JSON cache; `None` keeps the cache in memory
    pub cache_dir: Option<PathBuf>,
    pub eviction: EvictionPolicy,
    /// Publications requested per search (default: 25)
    pub default_depth: u32,
    pub include_full_text: bool,
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            eviction: EvictionPolicy::Never,
            default_depth: DEFAULT_SEARCH_DEPTH,
            include_full_text: false,
        }
    }
}

impl LiteratureConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            depth: self.default_depth,
            include_full_text: self.include_full_text,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the default locations, falling back to defaults
    ///
    /// A file that exists but does not parse is an error.
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Candidate config files, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".varviz.toml")];
        if let Some(home) = dirs_home() {
            paths.push(home.join(".config").join("varviz").join("config.toml"));
        }
        paths
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if p.max_concurrent_annotations == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrent_annotations must be greater than 0".to_string(),
            ));
        }
        if p.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.batch_size must be greater than 0".to_string(),
            ));
        }
        if !(p.nearby_radius.is_finite() && p.nearby_radius >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.nearby_radius must be a non-negative number, got {}",
                p.nearby_radius
            )));
        }
        if self.http.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "http.max_in_flight must be greater than 0".to_string(),
            ));
        }
        let cb = &self.http.circuit_breaker;
        if cb.failure_threshold == 0 || cb.success_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit breaker thresholds must be greater than 0".to_string(),
            ));
        }
        for (name, source) in self.sources.all() {
            if !source.enabled {
                continue;
            }
            if source.timeout_seconds == 0 {
                return Err(ConfigError::Invalid(format!(
                    "sources.{name}.timeout_seconds must be greater than 0"
                )));
            }
            url::Url::parse(&source.base_url).map_err(|e| {
                ConfigError::Invalid(format!("sources.{name}.base_url is not a URL: {e}"))
            })?;
        }
        if self.literature.default_depth == 0 {
            return Err(ConfigError::Invalid(
                "literature.default_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs_home().map(|home| home.join(".cache").join("varviz").join("literature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.nearby_radius, 8.0);
        assert_eq!(config.http.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.literature.eviction, EvictionPolicy::Never);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = PipelineConfig::parse(
            r#"
[pipeline]
max_concurrent_annotations = 4

[sources.myvariant]
enabled = false
base_url = "http://localhost:9000"
timeout_seconds = 3

[literature]
eviction = { policy = "max_age", max_age_secs = 3600 }
"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.max_concurrent_annotations, 4);
        assert_eq!(config.pipeline.batch_size, 100);
        assert_eq!(config.pipeline.max_literature_variants, 5);
        assert!(!config.sources.myvariant.enabled);
        assert_eq!(config.sources.ensembl.base_url, "https://rest.ensembl.org");
        assert_eq!(
            config.literature.eviction,
            EvictionPolicy::MaxAge { max_age_secs: 3600 }
        );
    }

    #[test]
    fn test_parse_error() {
        let err = PipelineConfig::parse("[pipeline\nbatch_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.sources.uniprot.base_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sources.uniprot.base_url"));

        // Disabled sources are not checked
        config.sources.uniprot.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = PipelineConfig::default();
        config.literature.cache_dir = Some(dir.path().join("lit"));
        config.http.rate_limit_ms = Some(50);
        config.to_file(&path).unwrap();

        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/varviz.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
