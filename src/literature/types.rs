//! Literature data model

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::gene::normalize_symbol;

/// Default number of publications requested upstream
pub const DEFAULT_SEARCH_DEPTH: u32 = 25;

/// How a variant was written in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotationKind {
    /// `p.Arg273His`, `p.R273H`
    ProteinHgvs,
    /// `c.818G>A`
    CodingHgvs,
    /// `g.7577120C>T`
    GenomicHgvs,
    /// `rs28934576`
    Rsid,
}

impl NotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotationKind::ProteinHgvs => "protein_hgvs",
            NotationKind::CodingHgvs => "coding_hgvs",
            NotationKind::GenomicHgvs => "genomic_hgvs",
            NotationKind::Rsid => "rsid",
        }
    }
}

impl fmt::Display for NotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A variant mention found in a publication
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MentionContext {
    /// Sentence the mention was found in
    pub snippet: String,
    /// The identifier as written
    pub matched: String,
    pub notation: NotationKind,
}

/// A publication as returned by a literature source, before mining
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPublication {
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub abstract_text: Option<String>,
    /// Only populated when full text was requested and available
    pub full_text: Option<String>,
}

/// A mined publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureEntry {
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub mentions: Vec<MentionContext>,
    pub relevance: f64,
    /// Up to three sentences describing a functional effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional_summary: Option<String>,
}

/// Upstream query parameters; part of the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Maximum number of publications to request
    pub depth: u32,
    pub include_full_text: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            depth: DEFAULT_SEARCH_DEPTH,
            include_full_text: false,
        }
    }
}

impl SearchParams {
    /// Stable hex digest of the parameters
    pub fn digest(&self) -> String {
        let canonical = format!("depth={};full_text={}", self.depth, self.include_full_text);
        hex_sha256(&canonical)
    }
}

/// Cache key: (gene, optional variant, parameter digest)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LiteratureKey {
    pub gene: String,
    pub variant: Option<String>,
    pub params_digest: String,
}

impl LiteratureKey {
    pub fn new(gene: &str, variant: Option<&str>, params: &SearchParams) -> Self {
        Self {
            gene: normalize_symbol(gene),
            variant: variant
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            params_digest: params.digest(),
        }
    }

    /// File-name-safe digest of the whole key
    pub fn digest(&self) -> String {
        hex_sha256(&self.to_string())
    }
}

impl fmt::Display for LiteratureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.gene,
            self.variant.as_deref().unwrap_or(""),
            self.params_digest
        )
    }
}

/// Outcome of the literature stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LiteratureStatus {
    /// Entries were served from the cache or freshly mined
    Ok,
    /// Literature was not requested
    Skipped,
    /// The literature source failed; nothing was cached
    Unavailable { reason: String },
}

impl LiteratureStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, LiteratureStatus::Ok)
    }
}

fn hex_sha256(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
