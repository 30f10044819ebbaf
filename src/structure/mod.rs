//! Protein structures reduced to one Cα coordinate per residue
//!
//! Residue numbers are 1-based and follow the structure's own (author)
//! numbering. AlphaFold models are numbered by UniProt position; experimental
//! entries carry [`ResidueSegment`]s that translate between the two.

pub mod pdb;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use pdb::{parse_ca_trace, CaTrace, PdbParseError};

/// Default search radius for neighbouring residues (Ångström)
pub const DEFAULT_NEARBY_RADIUS: f64 = 8.0;
/// Default cap on the number of neighbours reported
pub const DEFAULT_NEARBY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Predicted model from the AlphaFold database
    AlphaFold,
    /// Experimental entry from the PDB
    Pdb,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureKind::AlphaFold => write!(f, "AlphaFold"),
            StructureKind::Pdb => write!(f, "PDB"),
        }
    }
}

/// Identifier and shape of a resolved structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRef {
    pub kind: StructureKind,
    /// AlphaFold entry id (e.g. "AF-P04637-F1") or PDB id (e.g. "2OCJ")
    pub identifier: String,
    pub chain: String,
    pub residue_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in Ångström
    pub fn distance(&self, other: &Coordinate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residue {
    /// Residue number in the structure (1-based)
    pub number: u32,
    /// Three-letter residue name as written in the structure
    pub name: String,
    /// Cα position
    pub ca: Coordinate,
    /// B-factor column; pLDDT confidence for AlphaFold models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_factor: Option<f64>,
}

/// A residue close to a mapped variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResidue {
    /// UniProt position
    pub number: u32,
    pub name: String,
    pub distance: f64,
}

/// UniProt positions `uniprot_start..=uniprot_end` numbered consecutively
/// from `author_start` in the structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueSegment {
    pub uniprot_start: u32,
    pub uniprot_end: u32,
    pub author_start: u32,
}

impl ResidueSegment {
    pub fn new(uniprot_start: u32, uniprot_end: u32, author_start: u32) -> Self {
        Self {
            uniprot_start,
            uniprot_end,
            author_start,
        }
    }

    fn author_number(&self, position: u32) -> Option<u32> {
        (self.uniprot_start..=self.uniprot_end)
            .contains(&position)
            .then(|| self.author_start + (position - self.uniprot_start))
    }

    fn uniprot_position(&self, number: u32) -> Option<u32> {
        let offset = number.checked_sub(self.author_start)?;
        let position = self.uniprot_start + offset;
        (position <= self.uniprot_end).then_some(position)
    }
}

/// A resolved structure with its residue coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub reference: StructureRef,
    /// Residues sorted by number, no duplicates
    pub residues: Vec<Residue>,
    /// Empty when residue numbers are UniProt positions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<ResidueSegment>,
}

impl Structure {
    pub fn new(
        kind: StructureKind,
        identifier: impl Into<String>,
        chain: impl Into<String>,
        mut residues: Vec<Residue>,
    ) -> Self {
        residues.sort_by_key(|r| r.number);
        residues.dedup_by_key(|r| r.number);
        let reference = StructureRef {
            kind,
            identifier: identifier.into(),
            chain: chain.into(),
            residue_count: residues.len() as u32,
        };
        Self {
            reference,
            residues,
            segments: Vec::new(),
        }
    }

    /// Attach the UniProt ↔ author numbering of an experimental entry
    pub fn with_segments(mut self, mut segments: Vec<ResidueSegment>) -> Self {
        segments.sort_by_key(|s| s.uniprot_start);
        self.segments = segments;
        self
    }

    /// Build a structure from PDB text
    pub fn from_pdb(
        kind: StructureKind,
        identifier: impl Into<String>,
        contents: &str,
        chain: Option<char>,
    ) -> Result<Self, PdbParseError> {
        let trace = parse_ca_trace(contents, chain)?;
        Ok(Self::new(
            kind,
            identifier,
            trace.chain.to_string(),
            trace.residues,
        ))
    }

    pub fn residue_count(&self) -> u32 {
        self.reference.residue_count
    }

    /// Look up a residue by its author number
    pub fn residue(&self, number: u32) -> Option<&Residue> {
        self.residues
            .binary_search_by_key(&number, |r| r.number)
            .ok()
            .map(|i| &self.residues[i])
    }

    /// Author number of a UniProt position; `None` outside every mapped segment
    pub fn author_number(&self, position: u32) -> Option<u32> {
        if self.segments.is_empty() {
            return Some(position);
        }
        self.segments.iter().find_map(|s| s.author_number(position))
    }

    /// UniProt position of an author-numbered residue
    pub fn uniprot_position(&self, number: u32) -> Option<u32> {
        if self.segments.is_empty() {
            return Some(number);
        }
        self.segments.iter().find_map(|s| s.uniprot_position(number))
    }

    /// Residue at a UniProt position
    pub fn residue_at(&self, position: u32) -> Option<&Residue> {
        self.residue(self.author_number(position)?)
    }

    /// Residues whose Cα lies within `radius` of UniProt `position`, closest first
    ///
    /// Neighbours are reported by UniProt position; residues outside the
    /// mapped segments (tags, linkers) are left out.
    pub fn nearby_residues(&self, position: u32, radius: f64, limit: usize) -> Vec<NearbyResidue> {
        let Some(center) = self.residue_at(position) else {
            return Vec::new();
        };

        let mut nearby: Vec<NearbyResidue> = self
            .residues
            .iter()
            .filter(|r| r.number != center.number)
            .filter_map(|r| {
                let distance = center.ca.distance(&r.ca);
                if distance > radius {
                    return None;
                }
                Some(NearbyResidue {
                    number: self.uniprot_position(r.number)?,
                    name: r.name.clone(),
                    distance: (distance * 1000.0).round() / 1000.0,
                })
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.number.cmp(&b.number))
        });
        nearby.truncate(limit);
        nearby
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_structure(n: u32, spacing: f64) -> Structure {
        let residues = (1..=n)
            .map(|i| Residue {
                number: i,
                name: "ALA".to_string(),
                ca: Coordinate::new(i as f64 * spacing, 0.0, 0.0),
                b_factor: None,
            })
            .collect();
        Structure::new(StructureKind::AlphaFold, "AF-TEST-F1", "A", residues)
    }

    #[test]
    fn test_residue_lookup() {
        let s = line_structure(5, 3.8);
        assert_eq!(s.residue_count(), 5);
        assert_eq!(s.residue(3).map(|r| r.number), Some(3));
        assert!(s.residue(0).is_none());
        assert!(s.residue(6).is_none());
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let mut residues = line_structure(3, 1.0).residues;
        residues.reverse();
        residues.push(residues[0].clone());
        let s = Structure::new(StructureKind::Pdb, "1ABC", "A", residues);
        let numbers: Vec<u32> = s.residues.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(s.reference.residue_count, 3);
    }

    #[test]
    fn test_nearby_residues_sorted_and_capped() {
        let s = line_structure(40, 1.0);
        let nearby = s.nearby_residues(20, DEFAULT_NEARBY_RADIUS, DEFAULT_NEARBY_LIMIT);
        assert_eq!(nearby.len(), DEFAULT_NEARBY_LIMIT);
        assert_eq!(nearby[0].distance, 1.0);
        assert_eq!(nearby[0].number, 19);
        assert_eq!(nearby[1].number, 21);
        assert!(nearby.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(nearby.iter().all(|r| r.number != 20));
    }

    #[test]
    fn test_nearby_residues_respects_radius() {
        let s = line_structure(10, 5.0);
        let nearby = s.nearby_residues(5, 8.0, 10);
        let numbers: Vec<u32> = nearby.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![4, 6]);
        assert!(s.nearby_residues(99, 8.0, 10).is_empty());
    }

    #[test]
    fn test_segments_translate_numbering() {
        // Author 1..=20 covers UniProt 94..=113
        let s = line_structure(20, 1.0).with_segments(vec![ResidueSegment::new(94, 113, 1)]);
        assert_eq!(s.author_number(94), Some(1));
        assert_eq!(s.author_number(113), Some(20));
        assert_eq!(s.author_number(93), None);
        assert_eq!(s.author_number(114), None);
        assert_eq!(s.uniprot_position(5), Some(98));
        assert_eq!(s.residue_at(100).map(|r| r.number), Some(7));
        assert!(s.residue_at(3).is_none());

        let nearby = s.nearby_residues(100, 1.5, 10);
        let numbers: Vec<u32> = nearby.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![99, 101]);
    }

    #[test]
    fn test_residues_outside_segments_are_not_neighbours() {
        // Author 1..=3 is an expression tag; 4..=10 covers UniProt 50..=56
        let s = line_structure(10, 1.0).with_segments(vec![ResidueSegment::new(50, 56, 4)]);
        let nearby = s.nearby_residues(50, 3.0, 10);
        let numbers: Vec<u32> = nearby.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![51, 52, 53]);
    }

    #[test]
    fn test_coordinate_distance() {
        let a = Coordinate::new(0.0, 0.0, 0.0);
        let b = Coordinate::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
    }
}
