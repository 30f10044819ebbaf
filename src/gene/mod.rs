//! Gene resolution: symbol → canonical transcript, UniProt accession, structure
//!
//! The resolver itself lives in [`resolver`]; this module holds the data it
//! produces and the pure selection rules it applies.

pub mod resolver;

use serde::{Deserialize, Serialize};

use crate::error::VarvizError;
use crate::reference::Transcript;
use crate::structure::{Structure, StructureRef};

pub use resolver::{GeneLookup, GeneResolver, StructureSource};

/// A UniProt entry offered for a gene symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniprotCandidate {
    pub accession: String,
    /// Reviewed (Swiss-Prot) entry
    pub reviewed: bool,
    /// Primary gene names listed on the entry
    #[serde(default)]
    pub gene_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_length: Option<u32>,
}

impl UniprotCandidate {
    /// Ranking score: reviewed +3, canonical accession +2, exact gene name +1
    pub fn score(&self, symbol: &str) -> u8 {
        let mut score = 0;
        if self.reviewed {
            score += 3;
        }
        if !self.accession.contains('-') {
            score += 2;
        }
        if self
            .gene_names
            .iter()
            .any(|g| g.eq_ignore_ascii_case(symbol))
        {
            score += 1;
        }
        score
    }
}

/// What a [`GeneLookup`] knows about a gene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub symbol: String,
    pub transcripts: Vec<Transcript>,
    pub uniprot_candidates: Vec<UniprotCandidate>,
}

/// Resolved gene, shared by every variant of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneContext {
    /// Upper-cased gene symbol
    pub symbol: String,
    pub transcript: Transcript,
    pub uniprot: String,
    /// Amino acids encoded by the canonical transcript, excluding the stop
    pub protein_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<Structure>,
}

impl GeneContext {
    pub fn transcript_id(&self) -> &str {
        &self.transcript.id
    }

    pub fn structure_ref(&self) -> Option<&StructureRef> {
        self.structure.as_ref().map(|s| &s.reference)
    }
}

/// Trim and upper-case a gene symbol
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Choose the highest-scoring UniProt candidate; ties keep upstream order
pub fn select_uniprot<'a>(
    candidates: &'a [UniprotCandidate],
    symbol: &str,
) -> Option<&'a UniprotCandidate> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if b.score(symbol) >= c.score(symbol) => Some(b),
        _ => Some(c),
    })
}

/// Pick the canonical transcript
///
/// Longest CDS wins. Ties are broken by MANE status (Select, then Plus
/// Clinical). A tie that survives both rules is an error, as is a gene with
/// no usable coding transcript.
pub fn select_canonical_transcript<'a>(
    symbol: &str,
    transcripts: &'a [Transcript],
) -> Result<&'a Transcript, VarvizError> {
    let coding: Vec<&Transcript> = transcripts
        .iter()
        .filter(|t| t.is_coding() && t.is_consistent())
        .collect();

    let longest = coding
        .iter()
        .filter_map(|t| t.cds_length())
        .max()
        .ok_or_else(|| VarvizError::NoCanonicalTranscript {
            symbol: symbol.to_string(),
            reason: "no coding transcript with a consistent exon model".to_string(),
        })?;

    let mut tied: Vec<&Transcript> = coding
        .into_iter()
        .filter(|t| t.cds_length() == Some(longest))
        .collect();
    tied.sort_by(|a, b| a.id.cmp(&b.id));
    tied.dedup_by(|a, b| a.id == b.id);

    if tied.len() == 1 {
        return Ok(tied[0]);
    }

    let best_priority = tied
        .iter()
        .map(|t| t.mane_status.priority())
        .min()
        .unwrap_or(u8::MAX);
    let mut preferred = tied
        .iter()
        .filter(|t| t.mane_status.priority() == best_priority && t.mane_status.is_mane());

    match (preferred.next(), preferred.next()) {
        (Some(t), None) => Ok(*t),
        _ => Err(VarvizError::NoCanonicalTranscript {
            symbol: symbol.to_string(),
            reason: format!(
                "{} transcripts share the longest CDS ({} nt) without a MANE tie-break",
                tied.len(),
                longest
            ),
        }),
    }
}
