//! Structure sources: AlphaFold DB models and experimental PDB entries

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http_client::HttpClient;
use super::{sifts, uniprot};
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::gene::StructureSource;
use crate::structure::{Structure, StructureKind};

/// PDB entries tried per accession before giving up
const MAX_PDB_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    entry_id: String,
    pdb_url: String,
}

/// Predicted models from the AlphaFold database
pub struct AlphaFoldSource {
    client: Arc<HttpClient>,
    config: SourceConfig,
}

impl AlphaFoldSource {
    pub fn new(client: Arc<HttpClient>, config: SourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl StructureSource for AlphaFoldSource {
    fn name(&self) -> &str {
        "alphafold"
    }

    fn kind(&self) -> StructureKind {
        StructureKind::AlphaFold
    }

    async fn fetch_structure(&self, uniprot: &str) -> Result<Option<Structure>, SourceError> {
        let url = format!(
            "{}/api/prediction/{}",
            self.config.base_url.trim_end_matches('/'),
            uniprot
        );
        let timeout = self.config.timeout();
        let predictions: Option<Vec<Prediction>> = self.client.get_json(&url, timeout).await?;
        let Some(prediction) = predictions.and_then(|p| p.into_iter().next()) else {
            return Ok(None);
        };

        let Some(text) = self.client.get_text(&prediction.pdb_url, timeout).await? else {
            return Ok(None);
        };
        let structure = Structure::from_pdb(StructureKind::AlphaFold, prediction.entry_id, &text, None)
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(Some(structure))
    }
}

/// Experimental structures from RCSB, located via UniProt cross-references
///
/// Author residue numbers are translated to UniProt positions through the
/// PDBe SIFTS segments of the chosen chain.
pub struct RcsbStructureSource {
    client: Arc<HttpClient>,
    rcsb: SourceConfig,
    uniprot: SourceConfig,
    sifts: SourceConfig,
}

impl RcsbStructureSource {
    pub fn new(
        client: Arc<HttpClient>,
        rcsb: SourceConfig,
        uniprot: SourceConfig,
        sifts: SourceConfig,
    ) -> Self {
        Self {
            client,
            rcsb,
            uniprot,
            sifts,
        }
    }
}

#[async_trait]
impl StructureSource for RcsbStructureSource {
    fn name(&self) -> &str {
        "rcsb"
    }

    fn kind(&self) -> StructureKind {
        StructureKind::Pdb
    }

    async fn fetch_structure(&self, accession: &str) -> Result<Option<Structure>, SourceError> {
        let entries = uniprot::pdb_cross_references(
            &self.client,
            &self.uniprot.base_url,
            accession,
            self.uniprot.timeout(),
        )
        .await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let segments = sifts::residue_segments(
            &self.client,
            &self.sifts.base_url,
            accession,
            self.sifts.timeout(),
        )
        .await?;

        // Large entries are only published as mmCIF; those 404 here and the next one is tried
        for entry in entries.iter().take(MAX_PDB_ATTEMPTS) {
            let Some(chain) = entry.chain else {
                continue;
            };
            let Some(chain_segments) = segments.get(&(entry.id.to_ascii_uppercase(), chain)) else {
                debug!(pdb = %entry.id, chain = %chain, "no SIFTS mapping for chain");
                continue;
            };
            let url = format!(
                "{}/download/{}.pdb",
                self.rcsb.base_url.trim_end_matches('/'),
                entry.id
            );
            match self.client.get_text(&url, self.rcsb.timeout()).await? {
                Some(text) => {
                    return Structure::from_pdb(StructureKind::Pdb, entry.id.clone(), &text, Some(chain))
                        .map(|s| Some(s.with_segments(chain_segments.clone())))
                        .map_err(|e| SourceError::Decode(format!("{}: {e}", entry.id)));
                }
                None => debug!(pdb = %entry.id, "no PDB-format file"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prediction() {
        let json = r#"[{
            "entryId": "AF-P04637-F1",
            "gene": "TP53",
            "uniprotAccession": "P04637",
            "pdbUrl": "https://alphafold.ebi.ac.uk/files/AF-P04637-F1-model_v4.pdb",
            "latestVersion": 4
        }]"#;
        let predictions: Vec<Prediction> = serde_json::from_str(json).unwrap();
        assert_eq!(predictions[0].entry_id, "AF-P04637-F1");
        assert!(predictions[0].pdb_url.ends_with(".pdb"));
    }

    #[test]
    fn test_source_kinds() {
        let client = Arc::new(HttpClient::new(&Default::default()).unwrap());
        let af = AlphaFoldSource::new(client.clone(), SourceConfig::new("https://alphafold.ebi.ac.uk", 30));
        let rcsb = RcsbStructureSource::new(
            client,
            SourceConfig::new("https://files.rcsb.org", 30),
            SourceConfig::new("https://rest.uniprot.org", 15),
            SourceConfig::new("https://www.ebi.ac.uk/pdbe/api", 15),
        );
        assert_eq!(af.kind(), StructureKind::AlphaFold);
        assert_eq!(rcsb.kind(), StructureKind::Pdb);
        assert_eq!(rcsb.name(), "rcsb");
    }
}
