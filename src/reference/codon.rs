//! Genetic code, amino acids and strand helpers.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The standard genetic code, built once per process
pub static STANDARD_CODE: Lazy<CodonTable> = Lazy::new(CodonTable::standard);

/// A single nucleotide base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    A,
    T,
    G,
    C,
}

impl Base {
    /// Parse a base from a character.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Base::A),
            'T' | 'U' => Some(Base::T), // U is treated as T
            'G' => Some(Base::G),
            'C' => Some(Base::C),
            _ => None,
        }
    }

    /// Convert to character.
    pub fn to_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::T => 'T',
            Base::G => 'G',
            Base::C => 'C',
        }
    }

    /// Watson-Crick complement
    pub fn complement(self) -> Self {
        match self {
            Base::A => Base::T,
            Base::T => Base::A,
            Base::G => Base::C,
            Base::C => Base::G,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Reverse complement of a DNA string; non-ACGT characters become 'N'
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| Base::from_char(c).map_or('N', |b| b.complement().to_char()))
        .collect()
}

/// Amino acid residues (three-letter HGVS codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AminoAcid {
    Ala,
    Arg,
    Asn,
    Asp,
    Cys,
    Gln,
    Glu,
    Gly,
    His,
    Ile,
    Leu,
    Lys,
    Met,
    Phe,
    Pro,
    Ser,
    Thr,
    Trp,
    Tyr,
    Val,
    /// Translation stop
    Ter,
}

impl AminoAcid {
    /// Parse from 3-letter code (case-insensitive)
    pub fn from_three_letter(s: &str) -> Option<Self> {
        let aa = match s.to_ascii_lowercase().as_str() {
            "ala" => Self::Ala,
            "arg" => Self::Arg,
            "asn" => Self::Asn,
            "asp" => Self::Asp,
            "cys" => Self::Cys,
            "gln" => Self::Gln,
            "glu" => Self::Glu,
            "gly" => Self::Gly,
            "his" => Self::His,
            "ile" => Self::Ile,
            "leu" => Self::Leu,
            "lys" => Self::Lys,
            "met" => Self::Met,
            "phe" => Self::Phe,
            "pro" => Self::Pro,
            "ser" => Self::Ser,
            "thr" => Self::Thr,
            "trp" => Self::Trp,
            "tyr" => Self::Tyr,
            "val" => Self::Val,
            "ter" => Self::Ter,
            _ => return None,
        };
        Some(aa)
    }

    /// Parse from 1-letter code; `*` and `X` denote a stop
    pub fn from_one_letter(c: char) -> Option<Self> {
        let aa = match c {
            'A' => Self::Ala,
            'R' => Self::Arg,
            'N' => Self::Asn,
            'D' => Self::Asp,
            'C' => Self::Cys,
            'Q' => Self::Gln,
            'E' => Self::Glu,
            'G' => Self::Gly,
            'H' => Self::His,
            'I' => Self::Ile,
            'L' => Self::Leu,
            'K' => Self::Lys,
            'M' => Self::Met,
            'F' => Self::Phe,
            'P' => Self::Pro,
            'S' => Self::Ser,
            'T' => Self::Thr,
            'W' => Self::Trp,
            'Y' => Self::Tyr,
            'V' => Self::Val,
            '*' | 'X' => Self::Ter,
            _ => return None,
        };
        Some(aa)
    }

    pub fn to_three_letter(self) -> &'static str {
        match self {
            Self::Ala => "Ala",
            Self::Arg => "Arg",
            Self::Asn => "Asn",
            Self::Asp => "Asp",
            Self::Cys => "Cys",
            Self::Gln => "Gln",
            Self::Glu => "Glu",
            Self::Gly => "Gly",
            Self::His => "His",
            Self::Ile => "Ile",
            Self::Leu => "Leu",
            Self::Lys => "Lys",
            Self::Met => "Met",
            Self::Phe => "Phe",
            Self::Pro => "Pro",
            Self::Ser => "Ser",
            Self::Thr => "Thr",
            Self::Trp => "Trp",
            Self::Tyr => "Tyr",
            Self::Val => "Val",
            Self::Ter => "Ter",
        }
    }

    pub fn to_one_letter(self) -> char {
        match self {
            Self::Ala => 'A',
            Self::Arg => 'R',
            Self::Asn => 'N',
            Self::Asp => 'D',
            Self::Cys => 'C',
            Self::Gln => 'Q',
            Self::Glu => 'E',
            Self::Gly => 'G',
            Self::His => 'H',
            Self::Ile => 'I',
            Self::Leu => 'L',
            Self::Lys => 'K',
            Self::Met => 'M',
            Self::Phe => 'F',
            Self::Pro => 'P',
            Self::Ser => 'S',
            Self::Thr => 'T',
            Self::Trp => 'W',
            Self::Tyr => 'Y',
            Self::Val => 'V',
            Self::Ter => '*',
        }
    }

    pub fn is_stop(self) -> bool {
        self == Self::Ter
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_three_letter())
    }
}

/// A codon (three nucleotides).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Codon([Base; 3]);

impl Codon {
    /// Create a new codon from three bases.
    pub fn new(b1: Base, b2: Base, b3: Base) -> Self {
        Self([b1, b2, b3])
    }

    /// Parse a codon from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let b1 = Base::from_char(chars.next()?)?;
        let b2 = Base::from_char(chars.next()?)?;
        let b3 = Base::from_char(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Self([b1, b2, b3]))
    }

    /// Get the three bases.
    pub fn bases(&self) -> &[Base; 3] {
        &self.0
    }
}

impl fmt::Display for Codon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Genetic code table.
#[derive(Debug, Clone)]
pub struct CodonTable {
    codon_to_aa: HashMap<Codon, AminoAcid>,
}

impl CodonTable {
    /// Create the standard genetic code.
    pub fn standard() -> Self {
        // TCAG ordering: first base varies slowest.
        const BASES: [Base; 4] = [Base::T, Base::C, Base::A, Base::G];
        const AAS: &str = "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

        let mut codon_to_aa = HashMap::with_capacity(64);
        for (i, aa_char) in AAS.chars().enumerate() {
            let codon = Codon::new(BASES[i / 16], BASES[(i / 4) % 4], BASES[i % 4]);
            if let Some(aa) = AminoAcid::from_one_letter(aa_char) {
                codon_to_aa.insert(codon, aa);
            }
        }

        Self { codon_to_aa }
    }

    /// Get the amino acid encoded by a codon; stops map to `Ter`.
    pub fn amino_acid_for(&self, codon: &Codon) -> Option<AminoAcid> {
        self.codon_to_aa.get(codon).copied()
    }

    /// Translate a codon string; `None` for anything that is not three ACGT bases
    pub fn translate_codon(&self, codon: &str) -> Option<AminoAcid> {
        Codon::parse(codon).and_then(|c| self.amino_acid_for(&c))
    }

    /// Translate a coding sequence in frame, ignoring a trailing partial codon
    pub fn translate(&self, seq: &str) -> Vec<Option<AminoAcid>> {
        seq.as_bytes()
            .chunks_exact(3)
            .map(|chunk| std::str::from_utf8(chunk).ok().and_then(|c| self.translate_codon(c)))
            .collect()
    }

    /// Check if a codon is a stop codon.
    pub fn is_stop(&self, codon: &Codon) -> bool {
        self.amino_acid_for(codon) == Some(AminoAcid::Ter)
    }
}
