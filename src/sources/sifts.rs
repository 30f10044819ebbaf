//! PDBe SIFTS: residue-level UniProt ↔ PDB chain mappings

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::http_client::HttpClient;
use crate::error::SourceError;
use crate::structure::ResidueSegment;

/// Segments per (upper-case PDB id, chain)
pub type ChainSegments = HashMap<(String, char), Vec<ResidueSegment>>;

#[derive(Debug, Deserialize)]
struct AccessionMappings {
    #[serde(default, rename = "PDB")]
    pdb: HashMap<String, Vec<ChainMapping>>,
}

#[derive(Debug, Deserialize)]
struct ChainMapping {
    chain_id: String,
    unp_start: u32,
    unp_end: u32,
    start: ResidueId,
}

#[derive(Debug, Deserialize)]
struct ResidueId {
    author_residue_number: Option<i64>,
}

/// Every PDB chain segment mapped to `accession`
pub async fn residue_segments(
    client: &HttpClient,
    base_url: &str,
    accession: &str,
    timeout: Duration,
) -> Result<ChainSegments, SourceError> {
    let url = format!(
        "{}/mappings/uniprot/{}",
        base_url.trim_end_matches('/'),
        accession
    );
    let response: Option<HashMap<String, AccessionMappings>> = client.get_json(&url, timeout).await?;
    Ok(response
        .and_then(|mut r| r.remove(accession))
        .map(chain_segments)
        .unwrap_or_default())
}

fn chain_segments(mappings: AccessionMappings) -> ChainSegments {
    let mut segments = ChainSegments::new();
    for (pdb_id, chains) in mappings.pdb {
        for m in chains {
            let Some(chain) = m.chain_id.chars().next() else {
                continue;
            };
            // Negative or missing author numbers cannot be addressed in a PDB file we parse
            let Some(author_start) = m.start.author_residue_number.and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            if author_start == 0 || m.unp_end < m.unp_start {
                continue;
            }
            segments
                .entry((pdb_id.to_ascii_uppercase(), chain))
                .or_default()
                .push(ResidueSegment::new(m.unp_start, m.unp_end, author_start));
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPINGS: &str = r#"{
      "P04637": {
        "identifier": "P53_HUMAN",
        "PDB": {
          "2ocj": [
            {"entity_id": 1, "chain_id": "A", "struct_asym_id": "A", "unp_start": 94, "unp_end": 312,
             "start": {"author_residue_number": 94, "author_insertion_code": "", "residue_number": 1},
             "end": {"author_residue_number": 312, "author_insertion_code": "", "residue_number": 219}},
            {"entity_id": 1, "chain_id": "B", "struct_asym_id": "B", "unp_start": 94, "unp_end": 312,
             "start": {"author_residue_number": 94, "author_insertion_code": "", "residue_number": 1},
             "end": {"author_residue_number": 312, "author_insertion_code": "", "residue_number": 219}}
          ],
          "9p53": [
            {"entity_id": 1, "chain_id": "A", "struct_asym_id": "A", "unp_start": 94, "unp_end": 200,
             "start": {"author_residue_number": 1}, "end": {"author_residue_number": 107}},
            {"entity_id": 1, "chain_id": "A", "struct_asym_id": "A", "unp_start": 205, "unp_end": 312,
             "start": {"author_residue_number": 112}, "end": {"author_residue_number": 219}},
            {"entity_id": 2, "chain_id": "C", "struct_asym_id": "C", "unp_start": 1, "unp_end": 10,
             "start": {"author_residue_number": -3}, "end": {"author_residue_number": 6}}
          ]
        }
      }
    }"#;

    fn parse() -> ChainSegments {
        let mut response: HashMap<String, AccessionMappings> = serde_json::from_str(MAPPINGS).unwrap();
        chain_segments(response.remove("P04637").unwrap())
    }

    #[test]
    fn test_parse_chain_segments() {
        let segments = parse();
        assert_eq!(
            segments[&("2OCJ".to_string(), 'A')],
            vec![ResidueSegment::new(94, 312, 94)]
        );
        assert_eq!(segments[&("9P53".to_string(), 'A')].len(), 2);
        assert_eq!(
            segments[&("9P53".to_string(), 'A')][1],
            ResidueSegment::new(205, 312, 112)
        );
    }

    #[test]
    fn test_negative_author_numbers_are_dropped() {
        assert!(!parse().contains_key(&("9P53".to_string(), 'C')));
    }
}
