//! Caller-supplied genomic variants
//!
//! # Coordinate System
//!
//! | Field | Basis | Notes |
//! |-------|-------|-------|
//! | `GenomicVariant.position` | 1-based | VCF POS convention |
//! | `AlleleEdit.start`, `AlleleEdit.end` | 1-based | Inclusive span of reference bases |
//!
//! VCF-style alleles that share an anchor base (`G>GA`) are trimmed to their
//! minimal edit before mapping, so an insertion has an empty reference span.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VariantValidationError;

/// A genomic variant as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicVariant {
    /// Chromosome name ("17", "chr17", "X")
    pub chromosome: String,
    /// 1-based position of the first reference base
    pub position: i64,
    /// Reference allele
    pub reference: String,
    /// Alternate allele
    pub alternate: String,
}

impl GenomicVariant {
    pub fn new(
        chromosome: impl Into<String>,
        position: i64,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    /// Check the variant against the allele and position rules
    pub fn validate(&self) -> Result<(), VariantValidationError> {
        if self.chromosome.trim().is_empty() {
            return Err(VariantValidationError::EmptyChromosome);
        }
        if self.position < 1 {
            return Err(VariantValidationError::NonPositivePosition {
                position: self.position,
            });
        }
        validate_allele("reference", &self.reference)?;
        validate_allele("alternate", &self.alternate)?;
        if self.reference.eq_ignore_ascii_case(&self.alternate) {
            return Err(VariantValidationError::IdenticalAlleles);
        }
        Ok(())
    }

    /// Chromosome without a "chr" prefix, upper-cased
    pub fn normalized_chromosome(&self) -> String {
        normalize_chromosome(&self.chromosome)
    }

    /// Classify the change by allele lengths
    pub fn variant_type(&self) -> VariantType {
        let edit = self.edit();
        match (edit.reference.len(), edit.alternate.len()) {
            (1, 1) => VariantType::Snv,
            (r, a) if r == a => VariantType::Mnv,
            (0, _) => VariantType::Insertion,
            (_, 0) => VariantType::Deletion,
            _ => VariantType::Indel,
        }
    }

    /// HGVS genomic description, e.g. `17:g.7577120G>A`
    pub fn hgvs_g(&self) -> String {
        let chrom = self.normalized_chromosome();
        let edit = self.edit();
        let body = match (edit.reference.len(), edit.alternate.len()) {
            (1, 1) => format!("{}{}>{}", edit.start, edit.reference, edit.alternate),
            (0, _) => format!("{}_{}ins{}", edit.start - 1, edit.start, edit.alternate),
            (1, 0) => format!("{}del", edit.start),
            (_, 0) => format!("{}_{}del", edit.start, edit.end),
            (1, _) => format!("{}delins{}", edit.start, edit.alternate),
            _ => format!("{}_{}delins{}", edit.start, edit.end, edit.alternate),
        };
        format!("{}:g.{}", chrom, body)
    }

    /// Minimal edit after trimming shared prefix and suffix bases
    ///
    /// Assumes the variant has been validated.
    pub fn edit(&self) -> AlleleEdit {
        let reference = self.reference.to_ascii_uppercase();
        let alternate = self.alternate.to_ascii_uppercase();
        let ref_bytes = reference.as_bytes();
        let alt_bytes = alternate.as_bytes();

        let mut prefix = 0;
        while prefix < ref_bytes.len()
            && prefix < alt_bytes.len()
            && ref_bytes[prefix] == alt_bytes[prefix]
        {
            prefix += 1;
        }

        let mut suffix = 0;
        while suffix < ref_bytes.len() - prefix
            && suffix < alt_bytes.len() - prefix
            && ref_bytes[ref_bytes.len() - 1 - suffix] == alt_bytes[alt_bytes.len() - 1 - suffix]
        {
            suffix += 1;
        }

        let trimmed_ref = &reference[prefix..reference.len() - suffix];
        let trimmed_alt = &alternate[prefix..alternate.len() - suffix];
        let start = self.position as u64 + prefix as u64;
        // An insertion keeps start as the base after the insertion point.
        let end = if trimmed_ref.is_empty() {
            start.saturating_sub(1)
        } else {
            start + trimmed_ref.len() as u64 - 1
        };

        AlleleEdit {
            start,
            end,
            reference: trimmed_ref.to_string(),
            alternate: trimmed_alt.to_string(),
        }
    }
}

impl fmt::Display for GenomicVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}>{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

fn validate_allele(name: &str, allele: &str) -> Result<(), VariantValidationError> {
    if allele.is_empty() {
        return Err(VariantValidationError::EmptyAllele {
            allele: name.to_string(),
        });
    }
    if let Some(found) = allele
        .chars()
        .find(|c| !matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T'))
    {
        return Err(VariantValidationError::InvalidBase {
            allele: name.to_string(),
            found,
        });
    }
    Ok(())
}

/// Strip a leading "chr" and upper-case the remainder
pub fn normalize_chromosome(chrom: &str) -> String {
    let trimmed = chrom.trim();
    let without_prefix = if trimmed.len() > 3 && trimmed[..3].eq_ignore_ascii_case("chr") {
        &trimmed[3..]
    } else {
        trimmed
    };
    without_prefix.to_ascii_uppercase()
}

/// The minimal reference/alternate change of a variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleEdit {
    /// First affected reference base (1-based); for insertions, the base after the insertion point
    pub start: u64,
    /// Last affected reference base (1-based, inclusive); `start - 1` for insertions
    pub end: u64,
    /// Trimmed reference bases (empty for insertions)
    pub reference: String,
    /// Trimmed alternate bases (empty for deletions)
    pub alternate: String,
}

impl AlleleEdit {
    pub fn is_insertion(&self) -> bool {
        self.reference.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.alternate.is_empty()
    }

    /// Net change in sequence length
    pub fn length_change(&self) -> i64 {
        self.alternate.len() as i64 - self.reference.len() as i64
    }
}

/// Broad classification of a variant by allele shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    Snv,
    Mnv,
    Insertion,
    Deletion,
    Indel,
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantType::Snv => "single_nucleotide_variant",
            VariantType::Mnv => "multi_nucleotide_variant",
            VariantType::Insertion => "insertion",
            VariantType::Deletion => "deletion",
            VariantType::Indel => "indel",
        };
        write!(f, "{}", s)
    }
}
