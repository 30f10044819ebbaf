//! Genomic variant → transcript → protein → structure mapping
//!
//! # Coordinate System
//!
//! | Value | Basis | Notes |
//! |-------|-------|-------|
//! | genomic position | 1-based | Plus strand of the reference genome |
//! | CDS position | 1-based | `c.1` is the A of the start codon |
//! | residue / protein position | 1-based | Codon `n` spans `c.(3n-2)` to `c.3n` |
//!
//! Mapping is pure: it reads the resident [`GeneContext`] and performs no I/O.
//! Alleles on minus-strand transcripts are reverse-complemented before they
//! are compared with the transcript sequence.

mod protein;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::annotation::AnnotationRecord;
use crate::error::VariantValidationError;
use crate::gene::GeneContext;
use crate::reference::{reverse_complement, CdsLocation, Strand, Transcript, TxLocation};
use crate::structure::{Coordinate, NearbyResidue, DEFAULT_NEARBY_LIMIT, DEFAULT_NEARBY_RADIUS};
use crate::variant::{normalize_chromosome, AlleleEdit, GenomicVariant, VariantType};

pub use protein::{Consequence, ProteinChange};

/// Why a variant has no structure coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedReason {
    InvalidVariant,
    OutsideTranscript,
    NonCoding,
    ReferenceMismatch,
    Synonymous,
    NoStructure,
    ResidueOutOfRange,
    StructureNotRequested,
}

impl UnmappedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmappedReason::InvalidVariant => "invalid-variant",
            UnmappedReason::OutsideTranscript => "outside-transcript",
            UnmappedReason::NonCoding => "non-coding",
            UnmappedReason::ReferenceMismatch => "reference-mismatch",
            UnmappedReason::Synonymous => "synonymous",
            UnmappedReason::NoStructure => "no-structure",
            UnmappedReason::ResidueOutOfRange => "residue-out-of-range",
            UnmappedReason::StructureNotRequested => "structure-not-requested",
        }
    }
}

impl fmt::Display for UnmappedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change in CDS coordinates, alleles on the transcript's sense strand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingChange {
    /// First affected CDS base; for insertions, the base before the insertion point
    pub cds_start: u64,
    /// Last affected CDS base; for insertions, the base after the insertion point
    pub cds_end: u64,
    pub reference: String,
    pub alternate: String,
}

impl CodingChange {
    pub fn is_insertion(&self) -> bool {
        self.reference.is_empty()
    }

    /// HGVS `c.` body without the transcript prefix
    pub fn hgvs_body(&self) -> String {
        let (s, e) = (self.cds_start, self.cds_end);
        match (self.reference.len(), self.alternate.len()) {
            (0, _) => format!("c.{}_{}ins{}", s, e, self.alternate),
            (1, 1) => format!("c.{}{}>{}", s, self.reference, self.alternate),
            (1, 0) => format!("c.{}del", s),
            (_, 0) => format!("c.{}_{}del", s, e),
            (1, _) => format!("c.{}delins{}", s, self.alternate),
            _ => format!("c.{}_{}delins{}", s, e, self.alternate),
        }
    }

    fn length_change(&self) -> i64 {
        self.alternate.len() as i64 - self.reference.len() as i64
    }
}

/// One caller variant after mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedVariant {
    /// Position in the caller's input
    pub index: usize,
    pub variant: GenomicVariant,
    /// Symbol of the enclosing gene context
    pub gene: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_type: Option<VariantType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hgvs_g: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hgvs_c: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding_change: Option<CodingChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein_change: Option<ProteinChange>,
    /// Protein residue index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residue: Option<u32>,
    /// Residue number in the structure's own numbering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_residue: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nearby_residues: Vec<NearbyResidue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped: Option<UnmappedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<VariantValidationError>,
    /// Human-readable detail for the unmapped reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<AnnotationRecord>,
}

impl MappedVariant {
    fn new(index: usize, variant: &GenomicVariant, gene: &str) -> Self {
        Self {
            index,
            variant: variant.clone(),
            gene: gene.to_string(),
            variant_type: None,
            hgvs_g: None,
            hgvs_c: None,
            coding_change: None,
            protein_change: None,
            residue: None,
            structure_residue: None,
            coordinate: None,
            nearby_residues: Vec::new(),
            unmapped: None,
            validation_error: None,
            note: None,
            annotation: None,
        }
    }

    fn unmapped(mut self, reason: UnmappedReason, note: Option<String>) -> Self {
        self.unmapped = Some(reason);
        self.note = note;
        self
    }

    /// Mapped all the way to a structure coordinate
    pub fn is_mapped(&self) -> bool {
        self.unmapped.is_none()
    }

    /// Attach the annotation record; a record that is already attached is kept
    pub fn with_annotation(mut self, record: AnnotationRecord) -> Self {
        if self.annotation.is_none() {
            self.annotation = Some(record);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingOptions {
    pub include_structure: bool,
    /// Radius for neighbouring residues (Ångström)
    pub nearby_radius: f64,
    pub nearby_limit: usize,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            include_structure: true,
            nearby_radius: DEFAULT_NEARBY_RADIUS,
            nearby_limit: DEFAULT_NEARBY_LIMIT,
        }
    }
}

/// Maps variants against one resolved gene
pub struct CoordinateMapper<'a> {
    ctx: &'a GeneContext,
    options: MappingOptions,
}

/// Located edit in transcript space
struct TxEdit {
    /// Lowest transcript position touched; for insertions, the base before the insertion point
    lo: u64,
    /// Highest transcript position touched; for insertions, the base after the insertion point
    hi: u64,
    reference: String,
    alternate: String,
}

impl<'a> CoordinateMapper<'a> {
    pub fn new(ctx: &'a GeneContext, options: MappingOptions) -> Self {
        Self { ctx, options }
    }

    fn transcript(&self) -> &Transcript {
        &self.ctx.transcript
    }

    /// Map one variant
    pub fn map(&self, index: usize, variant: &GenomicVariant) -> MappedVariant {
        let mapped = MappedVariant::new(index, variant, &self.ctx.symbol);

        if let Err(e) = variant.validate() {
            let mut mapped = mapped.unmapped(UnmappedReason::InvalidVariant, Some(e.to_string()));
            mapped.validation_error = Some(e);
            return mapped;
        }

        let mut mapped = mapped;
        mapped.variant_type = Some(variant.variant_type());
        mapped.hgvs_g = Some(variant.hgvs_g());

        let tx = self.transcript();
        if variant.normalized_chromosome() != normalize_chromosome(&tx.chromosome) {
            return mapped.unmapped(
                UnmappedReason::OutsideTranscript,
                Some(format!("{} is on chromosome {}", tx.id, tx.chromosome)),
            );
        }

        let edit = variant.edit();
        let tx_edit = match self.locate(&edit) {
            Ok(e) => e,
            Err((reason, note)) => return mapped.unmapped(reason, Some(note)),
        };

        let coding = match self.to_coding(&tx_edit) {
            Some(c) => c,
            None => {
                return mapped.unmapped(
                    UnmappedReason::NonCoding,
                    Some(format!(
                        "transcript positions {}-{} are untranslated",
                        tx_edit.lo, tx_edit.hi
                    )),
                )
            }
        };

        if !coding.is_insertion() {
            let observed = tx.get_sequence(tx_edit.lo, tx_edit.hi).unwrap_or_default();
            if !observed.eq_ignore_ascii_case(&coding.reference) {
                return mapped.unmapped(
                    UnmappedReason::ReferenceMismatch,
                    Some(format!(
                        "{} has {} at c.{}, variant reference is {}",
                        tx.id, observed, coding.cds_start, coding.reference
                    )),
                );
            }
        }

        mapped.hgvs_c = Some(format!("{}:{}", tx.id, coding.hgvs_body()));
        let protein = protein::protein_change(tx, &coding);
        mapped.coding_change = Some(coding);

        let protein = match protein {
            Some(p) => p,
            None => {
                return mapped.unmapped(
                    UnmappedReason::ReferenceMismatch,
                    Some("transcript codon is not translatable".to_string()),
                )
            }
        };

        if protein.consequence == Consequence::Synonymous {
            mapped.protein_change = Some(protein);
            return mapped.unmapped(UnmappedReason::Synonymous, None);
        }

        let residue = protein.position;
        mapped.protein_change = Some(protein);
        mapped.residue = Some(residue);

        if !self.options.include_structure {
            return mapped.unmapped(UnmappedReason::StructureNotRequested, None);
        }
        let Some(structure) = self.ctx.structure.as_ref() else {
            return mapped.unmapped(UnmappedReason::NoStructure, None);
        };
        match structure.residue_at(residue) {
            Some(r) => {
                mapped.structure_residue = Some(r.number);
                mapped.coordinate = Some(r.ca);
                mapped.nearby_residues = structure.nearby_residues(
                    residue,
                    self.options.nearby_radius,
                    self.options.nearby_limit,
                );
                mapped
            }
            None => mapped.unmapped(
                UnmappedReason::ResidueOutOfRange,
                Some(match structure.author_number(residue) {
                    Some(number) => format!(
                        "{} has no residue {} ({} residues)",
                        structure.reference.identifier,
                        number,
                        structure.residue_count()
                    ),
                    None => format!(
                        "{} does not cover UniProt position {}",
                        structure.reference.identifier, residue
                    ),
                }),
            ),
        }
    }

    /// Place a genomic edit on the transcript
    fn locate(&self, edit: &AlleleEdit) -> Result<TxEdit, (UnmappedReason, String)> {
        let tx = self.transcript();
        let minus = tx.strand == Strand::Minus;
        let (left, right) = if edit.is_insertion() {
            (edit.start.saturating_sub(1), edit.start)
        } else {
            (edit.start, edit.end)
        };

        let (tl, tr) = match (tx.genomic_to_tx(left), tx.genomic_to_tx(right)) {
            (TxLocation::Exonic(a), TxLocation::Exonic(b)) => (a, b),
            (TxLocation::Outside, TxLocation::Outside) => {
                return Err((
                    UnmappedReason::OutsideTranscript,
                    format!("outside the span of {}", tx.id),
                ))
            }
            _ => {
                return Err((
                    UnmappedReason::NonCoding,
                    "intronic or outside the exons".to_string(),
                ))
            }
        };

        let (lo, hi) = (tl.min(tr), tl.max(tr));
        // Both ends must sit in the same exon block, contiguous in transcript space
        if hi - lo != right - left {
            return Err((
                UnmappedReason::NonCoding,
                "spans an exon boundary".to_string(),
            ));
        }

        let orient = |s: &str| {
            if minus {
                reverse_complement(s)
            } else {
                s.to_string()
            }
        };
        Ok(TxEdit {
            lo,
            hi,
            reference: orient(&edit.reference),
            alternate: orient(&edit.alternate),
        })
    }

    /// Express a transcript edit in CDS coordinates if it lies entirely in the CDS
    fn to_coding(&self, edit: &TxEdit) -> Option<CodingChange> {
        let tx = self.transcript();
        let lo = match tx.tx_to_cds(edit.lo)? {
            CdsLocation::Coding(c) => c,
            _ => return None,
        };
        let hi = match tx.tx_to_cds(edit.hi)? {
            CdsLocation::Coding(c) => c,
            _ => return None,
        };
        Some(CodingChange {
            cds_start: lo,
            cds_end: hi,
            reference: edit.reference.clone(),
            alternate: edit.alternate.clone(),
        })
    }

    /// Rebuild the minimal genomic variant for a coding change
    ///
    /// Insertions come back VCF-style with the preceding genomic base as anchor.
    pub fn to_genomic(&self, change: &CodingChange) -> Option<GenomicVariant> {
        let tx = self.transcript();
        let g_start = tx.cds_to_genomic(change.cds_start)?;
        let g_end = tx.cds_to_genomic(change.cds_end)?;
        let minus = tx.strand == Strand::Minus;
        let orient = |s: &str| {
            if minus {
                reverse_complement(s)
            } else {
                s.to_string()
            }
        };

        if change.is_insertion() {
            // Anchor is the genomically lower flank
            let (anchor_pos, anchor_cds) = if minus {
                (g_end, change.cds_end)
            } else {
                (g_start, change.cds_start)
            };
            let tx_pos = tx.cds_to_tx(anchor_cds)?;
            let anchor = orient(tx.get_sequence(tx_pos, tx_pos)?);
            return Some(GenomicVariant::new(
                tx.chromosome.clone(),
                anchor_pos as i64,
                anchor.clone(),
                format!("{}{}", anchor, orient(&change.alternate)),
            ));
        }

        Some(GenomicVariant::new(
            tx.chromosome.clone(),
            g_start.min(g_end) as i64,
            orient(&change.reference),
            orient(&change.alternate),
        ))
    }

    /// Genomic positions of the three bases of codon `residue`, in codon order
    pub fn residue_to_genomic(&self, residue: u32) -> Option<[u64; 3]> {
        if residue == 0 {
            return None;
        }
        let first = (residue as u64 - 1) * 3 + 1;
        let tx = self.transcript();
        Some([
            tx.cds_to_genomic(first)?,
            tx.cds_to_genomic(first + 1)?,
            tx.cds_to_genomic(first + 2)?,
        ])
    }
}
