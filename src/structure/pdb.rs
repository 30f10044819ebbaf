//! Minimal PDB text reader
//!
//! Only Cα atoms are kept: one per residue of the selected chain in the first
//! model. Alternate locations other than blank/`A`, HETATM records and
//! residues with insertion codes are skipped.

use thiserror::Error;

use super::{Coordinate, Residue};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdbParseError {
    #[error("no CA atoms found (chain {chain:?})")]
    NoResidues { chain: Option<char> },

    #[error("malformed ATOM record at line {line}: {reason}")]
    MalformedAtom { line: usize, reason: String },
}

/// Cα trace of one chain
#[derive(Debug, Clone, PartialEq)]
pub struct CaTrace {
    pub chain: char,
    /// Residues in file order
    pub residues: Vec<Residue>,
}

/// Extract the Cα trace for `chain`, or for the first chain seen when `None`
pub fn parse_ca_trace(contents: &str, chain: Option<char>) -> Result<CaTrace, PdbParseError> {
    let mut selected = chain;
    let mut residues: Vec<Residue> = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        if line.starts_with("ENDMDL") {
            break;
        }
        if line.get(0..6).map(str::trim) != Some("ATOM") {
            continue;
        }
        if line.get(12..16).map(str::trim) != Some("CA") {
            continue;
        }
        if !matches!(line.get(16..17), Some(" ") | Some("A") | None) {
            continue;
        }
        if line.get(26..27).and_then(extract_char).is_some() {
            continue;
        }

        let chain_id = line.get(21..22).and_then(extract_char).unwrap_or('A');
        match selected {
            Some(c) if c != chain_id => continue,
            None => selected = Some(chain_id),
            _ => {}
        }

        let residue = parse_ca_line(line).map_err(|reason| PdbParseError::MalformedAtom {
            line: idx + 1,
            reason,
        })?;
        if residue.number >= 1 && residues.last().map(|r| r.number) != Some(residue.number) {
            residues.push(residue);
        }
    }

    match selected {
        Some(chain) if !residues.is_empty() => Ok(CaTrace { chain, residues }),
        _ => Err(PdbParseError::NoResidues { chain }),
    }
}

fn parse_ca_line(line: &str) -> Result<Residue, String> {
    let name = line
        .get(17..20)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing residue name")?
        .to_ascii_uppercase();
    let number = parse_field::<i64>(line, 22..26).ok_or("missing residue number")?;
    let x = parse_field::<f64>(line, 30..38).ok_or("missing X coordinate")?;
    let y = parse_field::<f64>(line, 38..46).ok_or("missing Y coordinate")?;
    let z = parse_field::<f64>(line, 46..54).ok_or("missing Z coordinate")?;
    // AlphaFold stores per-residue pLDDT in the B-factor column
    let b_factor = parse_field::<f64>(line, 60..66);

    Ok(Residue {
        number: u32::try_from(number).unwrap_or(0),
        name,
        ca: Coordinate::new(x, y, z),
        b_factor,
    })
}

fn parse_field<T: std::str::FromStr>(line: &str, range: std::ops::Range<usize>) -> Option<T> {
    line.get(range)?.trim().parse().ok()
}

fn extract_char(field: &str) -> Option<char> {
    field.chars().next().filter(|c| !c.is_whitespace())
}
