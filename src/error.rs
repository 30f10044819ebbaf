//! Error types for varviz
//!
//! Errors fall into three groups:
//! - Fatal request errors ([`VarvizError`]) that abort an analysis
//! - Upstream call failures ([`SourceError`]) that the pipeline degrades around
//! - Per-variant input problems ([`VariantValidationError`])
//!
//! Every fatal error carries an [`ErrorCode`] so callers can branch on a
//! machine-readable kind instead of matching message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error codes for categorizing errors
///
/// These codes can be used for programmatic error handling
/// and for documentation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // Resolution errors (E1xxx)
    /// Gene symbol not found in the mapping source
    UnknownGene = 1001,
    /// Multiple candidate transcripts and no tie-break
    NoCanonicalTranscript = 1002,
    /// Request deadline elapsed while resolving the gene
    ResolutionTimeout = 1003,
    /// No AlphaFold model or PDB entry for the protein
    NoStructureAvailable = 1004,

    // Input errors (E2xxx)
    /// Malformed genomic variant
    InvalidVariant = 2001,

    // Mapping errors (E3xxx)
    /// Caller allele disagrees with the transcript model
    ReferenceMismatch = 3001,
    /// Residue index not present in the structure
    ResidueOutOfRange = 3002,

    // Upstream errors (E4xxx)
    /// Upstream source failed or returned an unusable payload
    SourceUnavailable = 4001,
    /// Upstream source did not answer in time
    SourceTimeout = 4002,
    /// Literature source failed
    LiteratureSourceUnavailable = 4003,

    // Infrastructure errors (E9xxx)
    /// File IO error
    IoError = 9001,
    /// JSON parsing error
    JsonError = 9002,
    /// Invalid configuration
    ConfigError = 9003,
    /// Background task failed to complete
    TaskFailed = 9004,
}

impl ErrorCode {
    /// Get the error code as a string (e.g., "E1001")
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a brief description of this error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnknownGene => "unknown gene symbol",
            ErrorCode::NoCanonicalTranscript => "no canonical transcript",
            ErrorCode::ResolutionTimeout => "gene resolution timed out",
            ErrorCode::NoStructureAvailable => "no structure available",
            ErrorCode::InvalidVariant => "invalid genomic variant",
            ErrorCode::ReferenceMismatch => "reference allele mismatch",
            ErrorCode::ResidueOutOfRange => "residue out of structure range",
            ErrorCode::SourceUnavailable => "upstream source unavailable",
            ErrorCode::SourceTimeout => "upstream source timed out",
            ErrorCode::LiteratureSourceUnavailable => "literature source unavailable",
            ErrorCode::IoError => "file I/O error",
            ErrorCode::JsonError => "JSON parsing error",
            ErrorCode::ConfigError => "configuration error",
            ErrorCode::TaskFailed => "background task failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a single upstream call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("circuit breaker open - source temporarily disabled")]
    CircuitBreakerOpen,
}

impl SourceError {
    /// Whether the failure was a timeout (as opposed to an error response)
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SourceError::Timeout(_) => ErrorCode::SourceTimeout,
            _ => ErrorCode::SourceUnavailable,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Structured reason a caller-supplied variant was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantValidationError {
    #[error("chromosome is empty")]
    EmptyChromosome,

    #[error("position must be >= 1, got {position}")]
    NonPositivePosition { position: i64 },

    #[error("{allele} allele is empty")]
    EmptyAllele { allele: String },

    #[error("{allele} allele contains invalid base '{found}'")]
    InvalidBase { allele: String, found: char },

    #[error("reference and alternate alleles are identical")]
    IdenticalAlleles,
}

/// Main error type for varviz operations
///
/// Only the variants listed in [`VarvizError::is_fatal`] abort an analysis;
/// everything else is reported inside the result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VarvizError {
    /// Gene symbol not found in the mapping source
    #[error("Unknown gene: {symbol}")]
    UnknownGene { symbol: String },

    /// No single canonical transcript could be chosen
    #[error("No canonical transcript for {symbol}: {reason}")]
    NoCanonicalTranscript { symbol: String, reason: String },

    /// Request deadline elapsed during gene resolution
    #[error("Gene resolution for {symbol} timed out after {elapsed_ms} ms")]
    ResolutionTimeout { symbol: String, elapsed_ms: u64 },

    /// Upstream lookup failed while resolving the gene
    #[error("Gene resolution for {symbol} failed: {source}")]
    ResolutionFailed {
        symbol: String,
        #[source]
        source: SourceError,
    },

    /// Invalid configuration
    #[error("Configuration error: {msg}")]
    Config { msg: String },

    /// Spawned work failed to complete (panic or abort)
    #[error("Task failed: {msg}")]
    Task { msg: String },

    /// IO error (for file operations)
    #[error("IO error: {msg}")]
    Io { msg: String },

    /// JSON error
    #[error("JSON error: {msg}")]
    Json { msg: String },
}

impl VarvizError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            VarvizError::UnknownGene { .. } => ErrorCode::UnknownGene,
            VarvizError::NoCanonicalTranscript { .. } => ErrorCode::NoCanonicalTranscript,
            VarvizError::ResolutionTimeout { .. } => ErrorCode::ResolutionTimeout,
            VarvizError::ResolutionFailed { source, .. } => source.code(),
            VarvizError::Config { .. } => ErrorCode::ConfigError,
            VarvizError::Task { .. } => ErrorCode::TaskFailed,
            VarvizError::Io { .. } => ErrorCode::IoError,
            VarvizError::Json { .. } => ErrorCode::JsonError,
        }
    }

    /// Machine-readable kind, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            VarvizError::UnknownGene { .. } => "unknown_gene",
            VarvizError::NoCanonicalTranscript { .. } => "no_canonical_transcript",
            VarvizError::ResolutionTimeout { .. } => "resolution_timeout",
            VarvizError::ResolutionFailed { .. } => "resolution_failed",
            VarvizError::Config { .. } => "config_error",
            VarvizError::Task { .. } => "task_failed",
            VarvizError::Io { .. } => "io_error",
            VarvizError::Json { .. } => "json_error",
        }
    }

    /// Whether this error aborts a whole analysis request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VarvizError::UnknownGene { .. }
                | VarvizError::NoCanonicalTranscript { .. }
                | VarvizError::ResolutionTimeout { .. }
                | VarvizError::ResolutionFailed { .. }
        )
    }

    /// Serializable form for transport layers
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().as_str(),
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub kind: String,
    pub message: String,
}

impl From<std::io::Error> for VarvizError {
    fn from(err: std::io::Error) -> Self {
        VarvizError::Io {
            msg: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VarvizError {
    fn from(err: serde_json::Error) -> Self {
        VarvizError::Json {
            msg: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for VarvizError {
    fn from(err: tokio::task::JoinError) -> Self {
        VarvizError::Task {
            msg: err.to_string(),
        }
    }
}
