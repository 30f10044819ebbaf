//! Amino-acid consequences of coding changes

use serde::{Deserialize, Serialize};
use std::fmt;

use super::CodingChange;
use crate::reference::{AminoAcid, Transcript, STANDARD_CODE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consequence {
    Missense,
    Synonymous,
    StopGained,
    StopLost,
    StartLost,
    Frameshift,
    InframeDeletion,
    InframeInsertion,
    InframeIndel,
}

impl fmt::Display for Consequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Consequence::Missense => "missense_variant",
            Consequence::Synonymous => "synonymous_variant",
            Consequence::StopGained => "stop_gained",
            Consequence::StopLost => "stop_lost",
            Consequence::StartLost => "start_lost",
            Consequence::Frameshift => "frameshift_variant",
            Consequence::InframeDeletion => "inframe_deletion",
            Consequence::InframeInsertion => "inframe_insertion",
            Consequence::InframeIndel => "inframe_indel",
        };
        write!(f, "{}", s)
    }
}

/// Amino-acid change at the first affected residue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinChange {
    /// 1-based residue number
    pub position: u32,
    pub reference: AminoAcid,
    /// Replacement residue; `None` for frameshifts and in-frame indels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate: Option<AminoAcid>,
    pub consequence: Consequence,
}

impl ProteinChange {
    /// Short HGVS `p.` form; indels are reported at their first residue only
    pub fn hgvs_p(&self) -> String {
        let head = format!("p.{}{}", self.reference, self.position);
        match (self.consequence, self.alternate) {
            (Consequence::Synonymous, _) => format!("{}=", head),
            (Consequence::Frameshift, _) => format!("{}fs", head),
            (Consequence::InframeDeletion, _) => format!("{}del", head),
            (Consequence::InframeInsertion, _) => format!("{}ins", head),
            (Consequence::InframeIndel, _) => format!("{}delins", head),
            (_, Some(alt)) => format!("{}{}", head, alt),
            (_, None) => format!("{}?", head),
        }
    }
}

/// Translate a validated coding change into its protein consequence
pub(super) fn protein_change(tx: &Transcript, change: &CodingChange) -> Option<ProteinChange> {
    let cds = tx.cds_sequence()?.to_ascii_uppercase();

    if change.reference.len() == change.alternate.len() {
        return substitution(&cds, change);
    }

    // First codon whose bases are touched by the indel
    let first_base = if change.is_insertion() {
        change.cds_end
    } else {
        change.cds_start
    };
    let codon_number = (first_base - 1) / 3 + 1;
    let reference = codon_aa(&cds, codon_number)?;
    let consequence = if change.length_change() % 3 != 0 {
        Consequence::Frameshift
    } else if change.alternate.is_empty() {
        Consequence::InframeDeletion
    } else if change.reference.is_empty() {
        Consequence::InframeInsertion
    } else {
        Consequence::InframeIndel
    };

    Some(ProteinChange {
        position: codon_number as u32,
        reference,
        alternate: None,
        consequence,
    })
}

fn substitution(cds: &str, change: &CodingChange) -> Option<ProteinChange> {
    let first_codon = (change.cds_start - 1) / 3 + 1;
    let last_codon = (change.cds_end - 1) / 3 + 1;
    let window_start = ((first_codon - 1) * 3) as usize;
    let window_end = (last_codon * 3) as usize;
    let original = cds.get(window_start..window_end)?;

    let offset = (change.cds_start - 1) as usize - window_start;
    let mut mutated = original.to_string();
    mutated.replace_range(offset..offset + change.alternate.len(), &change.alternate);

    let before = STANDARD_CODE.translate(original);
    let after = STANDARD_CODE.translate(&mutated);

    let mut first_change = None;
    for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
        let (b, a) = ((*b)?, (*a)?);
        if b != a && first_change.is_none() {
            first_change = Some((i, b, a));
        }
    }

    let (i, reference, alternate) = match first_change {
        Some(found) => found,
        None => {
            let reference = (*before.first()?)?;
            return Some(ProteinChange {
                position: first_codon as u32,
                reference,
                alternate: Some(reference),
                consequence: Consequence::Synonymous,
            });
        }
    };

    let position = first_codon as u32 + i as u32;
    let consequence = if position == 1 && reference == AminoAcid::Met {
        Consequence::StartLost
    } else if reference.is_stop() {
        Consequence::StopLost
    } else if alternate.is_stop() {
        Consequence::StopGained
    } else {
        Consequence::Missense
    };

    Some(ProteinChange {
        position,
        reference,
        alternate: Some(alternate),
        consequence,
    })
}

fn codon_aa(cds: &str, number: u64) -> Option<AminoAcid> {
    let start = ((number - 1) * 3) as usize;
    STANDARD_CODE.translate_codon(cds.get(start..start + 3)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::transcript::tests::plus_transcript;

    fn change(start: u64, end: u64, r: &str, a: &str) -> CodingChange {
        CodingChange {
            cds_start: start,
            cds_end: end,
            reference: r.to_string(),
            alternate: a.to_string(),
        }
    }

    #[test]
    fn test_start_lost() {
        let tx = plus_transcript();
        let p = protein_change(&tx, &change(2, 2, "T", "C")).unwrap();
        assert_eq!(p.consequence, Consequence::StartLost);
        assert_eq!(p.hgvs_p(), "p.Met1Thr");
    }

    #[test]
    fn test_stop_lost() {
        let tx = plus_transcript();
        // TAA -> CAA (Gln)
        let p = protein_change(&tx, &change(10, 10, "T", "C")).unwrap();
        assert_eq!(p.consequence, Consequence::StopLost);
        assert_eq!(p.position, 4);
        assert_eq!(p.hgvs_p(), "p.Ter4Gln");
    }

    #[test]
    fn test_mnv_spanning_codons_reports_first_change() {
        let tx = plus_transcript();
        // c.6-7: C|T -> T|A ; GCC->GCT (Ala, silent), TGG->AGG (Arg)
        let p = protein_change(&tx, &change(6, 7, "CT", "TA")).unwrap();
        assert_eq!(p.position, 3);
        assert_eq!(p.reference, AminoAcid::Trp);
        assert_eq!(p.alternate, Some(AminoAcid::Arg));
        assert_eq!(p.consequence, Consequence::Missense);
    }

    #[test]
    fn test_insertion_position() {
        let tx = plus_transcript();
        // between c.3 and c.4 lands on codon 2
        let p = protein_change(&tx, &change(3, 4, "", "A")).unwrap();
        assert_eq!(p.position, 2);
        assert_eq!(p.consequence, Consequence::Frameshift);
        assert_eq!(p.hgvs_p(), "p.Ala2fs");
    }

    #[test]
    fn test_consequence_display() {
        assert_eq!(Consequence::StopGained.to_string(), "stop_gained");
        assert_eq!(
            serde_json::to_string(&Consequence::InframeDeletion).unwrap(),
            "\"inframe_deletion\""
        );
    }
}
