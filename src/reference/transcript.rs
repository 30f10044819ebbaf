//! Transcript and exon models
//!
//! # Coordinate System
//!
//! All coordinates in this module are **1-based inclusive**:
//!
//! | Field | Basis | Notes |
//! |-------|-------|-------|
//! | `Exon.start`, `Exon.end` | 1-based | Transcript coordinates (inclusive) |
//! | `Exon.genomic_start`, `Exon.genomic_end` | 1-based | Genomic coordinates, `start <= end` on both strands |
//! | `Transcript.cds_start`, `Transcript.cds_end` | 1-based | CDS boundaries in transcript space |
//! | CDS positions | 1-based | `c.1` is the A of the start codon |
//!
//! Exons are listed in transcript order. On the minus strand exon 1 therefore
//! has the highest genomic coordinates, and `Transcript.sequence` holds the
//! sense (mRNA) strand.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::codon::STANDARD_CODE;

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Strand {
    #[serde(rename = "+")]
    #[default]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

/// An exon in a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exon {
    /// Exon number (1-based, transcript order)
    pub number: u32,
    /// Start position in transcript coordinates (1-based, inclusive)
    pub start: u64,
    /// End position in transcript coordinates (1-based, inclusive)
    pub end: u64,
    /// Genomic start position (1-based, inclusive)
    pub genomic_start: u64,
    /// Genomic end position (1-based, inclusive)
    pub genomic_end: u64,
}

impl Exon {
    pub fn new(number: u32, start: u64, end: u64, genomic_start: u64, genomic_end: u64) -> Self {
        Self {
            number,
            start,
            end,
            genomic_start,
            genomic_end,
        }
    }

    /// Length of the exon in transcript space
    pub fn len(&self) -> u64 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a transcript position is within this exon
    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.start && pos <= self.end
    }

    /// Check if a genomic position is within this exon
    pub fn contains_genomic(&self, pos: u64) -> bool {
        pos >= self.genomic_start && pos <= self.genomic_end
    }
}

/// MANE (Matched Annotation from NCBI and EBI) transcript status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ManeStatus {
    /// Not a MANE transcript
    #[default]
    None,
    /// MANE Select - single representative transcript per gene
    Select,
    /// MANE Plus Clinical - additional clinically relevant transcripts
    PlusClinical,
}

impl ManeStatus {
    pub fn is_mane(&self) -> bool {
        !matches!(self, ManeStatus::None)
    }

    pub fn is_select(&self) -> bool {
        matches!(self, ManeStatus::Select)
    }

    /// Get priority score for sorting (lower is better)
    pub fn priority(&self) -> u8 {
        match self {
            ManeStatus::Select => 0,
            ManeStatus::PlusClinical => 1,
            ManeStatus::None => 2,
        }
    }
}

impl std::fmt::Display for ManeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManeStatus::None => write!(f, ""),
            ManeStatus::Select => write!(f, "MANE Select"),
            ManeStatus::PlusClinical => write!(f, "MANE Plus Clinical"),
        }
    }
}

/// Where a genomic position falls relative to a transcript's exons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxLocation {
    /// Inside an exon, at this transcript position
    Exonic(u64),
    /// Between exons, after the given exon (transcript order)
    Intronic { upstream_exon: u32 },
    /// Outside the transcript's genomic span
    Outside,
}

/// Where a transcript position falls relative to the CDS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdsLocation {
    FivePrimeUtr,
    Coding(u64),
    ThreePrimeUtr,
}

/// A transcript with its exon structure and sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript accession (e.g., "ENST00000269305.9")
    pub id: String,

    /// Gene symbol (e.g., "TP53")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_symbol: Option<String>,

    /// Chromosome name (e.g., "17", "X")
    pub chromosome: String,

    /// Strand orientation
    pub strand: Strand,

    /// Full transcript sequence (sense strand)
    pub sequence: String,

    /// CDS start position (1-based, in transcript coordinates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_start: Option<u64>,

    /// CDS end position (1-based, in transcript coordinates, includes the stop codon)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_end: Option<u64>,

    /// Exons in transcript order
    pub exons: Vec<Exon>,

    #[serde(default)]
    pub mane_status: ManeStatus,
}

impl Transcript {
    /// Get the length of the transcript sequence
    pub fn sequence_length(&self) -> u64 {
        self.sequence.len() as u64
    }

    /// Check if this is a coding transcript
    pub fn is_coding(&self) -> bool {
        self.cds_length().is_some()
    }

    /// Get the CDS length
    pub fn cds_length(&self) -> Option<u64> {
        match (self.cds_start, self.cds_end) {
            (Some(start), Some(end)) if end >= start => Some(end - start + 1),
            _ => None,
        }
    }

    /// Coding sequence including the stop codon
    pub fn cds_sequence(&self) -> Option<&str> {
        let start = self.cds_start? as usize;
        let end = self.cds_end? as usize;
        if start == 0 || end > self.sequence.len() || start > end {
            return None;
        }
        self.sequence.get(start - 1..end)
    }

    /// Codon by 1-based codon number
    pub fn codon(&self, number: u64) -> Option<&str> {
        if number == 0 {
            return None;
        }
        let cds = self.cds_sequence()?;
        let start = ((number - 1) * 3) as usize;
        cds.get(start..start + 3)
    }

    /// Number of amino acids encoded, excluding a terminal stop
    pub fn protein_length(&self) -> Option<u32> {
        let cds = self.cds_sequence()?;
        let codons = (cds.len() / 3) as u32;
        if codons == 0 {
            return None;
        }
        let last = self.codon(codons as u64)?;
        let ends_with_stop = STANDARD_CODE
            .translate_codon(last)
            .is_some_and(|aa| aa.is_stop());
        Some(if ends_with_stop { codons - 1 } else { codons })
    }

    /// Sequence between two transcript positions (1-based, inclusive)
    pub fn get_sequence(&self, start: u64, end: u64) -> Option<&str> {
        if start == 0 || end < start {
            return None;
        }
        self.sequence.get(start as usize - 1..end as usize)
    }

    /// Find which exon contains a transcript position using binary search
    pub fn exon_at(&self, pos: u64) -> Option<&Exon> {
        self.exons
            .binary_search_by(|e| {
                if pos < e.start {
                    Ordering::Greater
                } else if pos > e.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
            .map(|i| &self.exons[i])
    }

    /// Genomic span covered by the exons
    pub fn genomic_span(&self) -> Option<(u64, u64)> {
        let start = self.exons.iter().map(|e| e.genomic_start).min()?;
        let end = self.exons.iter().map(|e| e.genomic_end).max()?;
        Some((start, end))
    }

    /// Check if a genomic position falls within this transcript's span
    pub fn contains_genomic_pos(&self, pos: u64) -> bool {
        self.genomic_span()
            .is_some_and(|(start, end)| pos >= start && pos <= end)
    }

    /// Check that exons tile the transcript and agree with their genomic lengths
    pub fn is_consistent(&self) -> bool {
        if self.exons.is_empty() {
            return false;
        }
        let mut expected_start = 1;
        for exon in &self.exons {
            if exon.start != expected_start
                || exon.is_empty()
                || exon.genomic_end < exon.genomic_start
                || exon.genomic_end - exon.genomic_start + 1 != exon.len()
            {
                return false;
            }
            expected_start = exon.end + 1;
        }
        if expected_start - 1 != self.sequence_length() {
            return false;
        }
        match (self.cds_start, self.cds_end) {
            (Some(s), Some(e)) => s >= 1 && e >= s && e <= self.sequence_length(),
            (None, None) => true,
            _ => false,
        }
    }

    /// Map a genomic position onto the transcript
    pub fn genomic_to_tx(&self, pos: u64) -> TxLocation {
        if !self.contains_genomic_pos(pos) {
            return TxLocation::Outside;
        }
        for exon in &self.exons {
            if exon.contains_genomic(pos) {
                let offset = match self.strand {
                    Strand::Plus => pos - exon.genomic_start,
                    Strand::Minus => exon.genomic_end - pos,
                };
                return TxLocation::Exonic(exon.start + offset);
            }
        }
        // Inside the span but in no exon: find the exon preceding it in transcript order
        let upstream_exon = self
            .exons
            .iter()
            .filter(|e| match self.strand {
                Strand::Plus => e.genomic_end < pos,
                Strand::Minus => e.genomic_start > pos,
            })
            .map(|e| e.number)
            .max()
            .unwrap_or(0);
        TxLocation::Intronic { upstream_exon }
    }

    /// Map a transcript position back to the genome
    pub fn tx_to_genomic(&self, tx_pos: u64) -> Option<u64> {
        let exon = self.exon_at(tx_pos)?;
        let offset = tx_pos - exon.start;
        Some(match self.strand {
            Strand::Plus => exon.genomic_start + offset,
            Strand::Minus => exon.genomic_end - offset,
        })
    }

    /// Classify a transcript position against the CDS
    pub fn tx_to_cds(&self, tx_pos: u64) -> Option<CdsLocation> {
        let (start, end) = (self.cds_start?, self.cds_end?);
        Some(if tx_pos < start {
            CdsLocation::FivePrimeUtr
        } else if tx_pos > end {
            CdsLocation::ThreePrimeUtr
        } else {
            CdsLocation::Coding(tx_pos - start + 1)
        })
    }

    /// Transcript position of a CDS position
    pub fn cds_to_tx(&self, cds_pos: u64) -> Option<u64> {
        let len = self.cds_length()?;
        if cds_pos == 0 || cds_pos > len {
            return None;
        }
        Some(self.cds_start? + cds_pos - 1)
    }

    /// Genomic position of a CDS position
    pub fn cds_to_genomic(&self, cds_pos: u64) -> Option<u64> {
        self.cds_to_tx(cds_pos)
            .and_then(|tx| self.tx_to_genomic(tx))
    }

    /// CDS position of a genomic position, if it is coding
    pub fn genomic_to_cds(&self, pos: u64) -> Option<u64> {
        match self.genomic_to_tx(pos) {
            TxLocation::Exonic(tx) => match self.tx_to_cds(tx)? {
                CdsLocation::Coding(c) => Some(c),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_mane_select(&self) -> bool {
        self.mane_status.is_select()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two-exon plus-strand transcript: 5'UTR of 2, CDS ATG GCC | TGG TAA, 3'UTR of 2
    pub(crate) fn plus_transcript() -> Transcript {
        Transcript {
            id: "TX_PLUS.1".to_string(),
            gene_symbol: Some("PLUS".to_string()),
            chromosome: "1".to_string(),
            strand: Strand::Plus,
            sequence: "CCATGGCCTGGTAAGG".to_string(),
            cds_start: Some(3),
            cds_end: Some(14),
            exons: vec![Exon::new(1, 1, 8, 1001, 1008), Exon::new(2, 9, 16, 2001, 2008)],
            mane_status: ManeStatus::Select,
        }
    }

    /// Same mRNA laid out on the minus strand
    pub(crate) fn minus_transcript() -> Transcript {
        Transcript {
            id: "TX_MINUS.1".to_string(),
            gene_symbol: Some("MINUS".to_string()),
            chromosome: "2".to_string(),
            strand: Strand::Minus,
            sequence: "CCATGGCCTGGTAAGG".to_string(),
            cds_start: Some(3),
            cds_end: Some(14),
            exons: vec![Exon::new(1, 1, 8, 5001, 5008), Exon::new(2, 9, 16, 3001, 3008)],
            mane_status: ManeStatus::None,
        }
    }

    #[test]
    fn test_consistency() {
        assert!(plus_transcript().is_consistent());
        assert!(minus_transcript().is_consistent());

        let mut broken = plus_transcript();
        broken.exons[1].genomic_end = 2010;
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_cds_helpers() {
        let tx = plus_transcript();
        assert_eq!(tx.cds_length(), Some(12));
        assert_eq!(tx.cds_sequence(), Some("ATGGCCTGGTAA"));
        assert_eq!(tx.codon(1), Some("ATG"));
        assert_eq!(tx.codon(3), Some("TGG"));
        assert_eq!(tx.codon(5), None);
        assert_eq!(tx.protein_length(), Some(3));
    }

    #[test]
    fn test_plus_strand_mapping() {
        let tx = plus_transcript();
        assert_eq!(tx.genomic_to_tx(1001), TxLocation::Exonic(1));
        assert_eq!(tx.genomic_to_tx(2001), TxLocation::Exonic(9));
        assert_eq!(
            tx.genomic_to_tx(1500),
            TxLocation::Intronic { upstream_exon: 1 }
        );
        assert_eq!(tx.genomic_to_tx(999), TxLocation::Outside);
        assert_eq!(tx.genomic_to_cds(1003), Some(1));
        assert_eq!(tx.genomic_to_cds(2001), Some(7));
        assert_eq!(tx.genomic_to_cds(1001), None);
        assert_eq!(tx.cds_to_genomic(7), Some(2001));
    }

    #[test]
    fn test_minus_strand_mapping() {
        let tx = minus_transcript();
        assert_eq!(tx.genomic_to_tx(5008), TxLocation::Exonic(1));
        assert_eq!(tx.genomic_to_tx(5001), TxLocation::Exonic(8));
        assert_eq!(tx.genomic_to_tx(3008), TxLocation::Exonic(9));
        assert_eq!(
            tx.genomic_to_tx(4000),
            TxLocation::Intronic { upstream_exon: 1 }
        );
        assert_eq!(tx.genomic_to_cds(5006), Some(1));
        assert_eq!(tx.cds_to_genomic(1), Some(5006));
        assert_eq!(tx.cds_to_genomic(12), Some(3003));
    }

    #[test]
    fn test_cds_location() {
        let tx = plus_transcript();
        assert_eq!(tx.tx_to_cds(2), Some(CdsLocation::FivePrimeUtr));
        assert_eq!(tx.tx_to_cds(3), Some(CdsLocation::Coding(1)));
        assert_eq!(tx.tx_to_cds(15), Some(CdsLocation::ThreePrimeUtr));
        assert_eq!(tx.cds_to_tx(0), None);
        assert_eq!(tx.cds_to_tx(13), None);
    }

    #[test]
    fn test_exon_at() {
        let tx = plus_transcript();
        assert_eq!(tx.exon_at(8).map(|e| e.number), Some(1));
        assert_eq!(tx.exon_at(9).map(|e| e.number), Some(2));
        assert!(tx.exon_at(17).is_none());
    }

    #[test]
    fn test_mane_priority() {
        assert!(ManeStatus::Select.priority() < ManeStatus::PlusClinical.priority());
        assert!(ManeStatus::PlusClinical.priority() < ManeStatus::None.priority());
        assert_eq!(ManeStatus::Select.to_string(), "MANE Select");
    }
}
