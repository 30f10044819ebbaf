//! UniProt REST: accession candidates, GO terms and PDB cross-references

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::HttpClient;
use crate::annotation::{AnnotationSource, GoTerm, PartialAnnotation, SourceKind};
use crate::cache::LruCache;
use crate::error::SourceError;
use crate::gene::{GeneContext, UniprotCandidate};
use crate::variant::GenomicVariant;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    primary_accession: String,
    #[serde(default)]
    entry_type: String,
    #[serde(default)]
    genes: Vec<Gene>,
    sequence: Option<Sequence>,
    #[serde(default, rename = "uniProtKBCrossReferences")]
    cross_references: Vec<CrossReference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gene {
    gene_name: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Value {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Sequence {
    length: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CrossReference {
    database: String,
    id: String,
    #[serde(default)]
    properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
struct Property {
    key: String,
    value: String,
}

impl Entry {
    fn into_candidate(self) -> UniprotCandidate {
        UniprotCandidate {
            reviewed: self.entry_type.contains("reviewed") && !self.entry_type.contains("unreviewed"),
            gene_names: self
                .genes
                .into_iter()
                .filter_map(|g| g.gene_name.map(|n| n.value))
                .collect(),
            sequence_length: self.sequence.and_then(|s| s.length),
            accession: self.primary_accession,
        }
    }

    fn property(xref: &CrossReference, key: &str) -> Option<String> {
        xref.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.clone())
    }

    fn go_terms(&self) -> Vec<GoTerm> {
        self.cross_references
            .iter()
            .filter(|x| x.database == "GO")
            .map(|x| {
                let label = Self::property(x, "GoTerm").unwrap_or_default();
                let (aspect, name) = match label.split_once(':') {
                    Some((a, n)) if a.len() == 1 => (Some(a.to_string()), n.to_string()),
                    _ => (None, label),
                };
                GoTerm {
                    id: x.id.clone(),
                    name,
                    aspect,
                }
            })
            .collect()
    }

    fn pdb_entries(&self) -> Vec<PdbCrossReference> {
        self.cross_references
            .iter()
            .filter(|x| x.database == "PDB")
            .map(|x| {
                let chains = Self::property(x, "Chains");
                PdbCrossReference {
                    id: x.id.clone(),
                    method: Self::property(x, "Method"),
                    resolution: Self::property(x, "Resolution").and_then(|r| parse_resolution(&r)),
                    chain: chains.as_deref().and_then(first_chain),
                    coverage: chains.as_deref().and_then(first_range).map(|(a, b)| b - a + 1),
                }
            })
            .collect()
    }
}

/// A PDB entry listed on a UniProt record
#[derive(Debug, Clone, PartialEq)]
pub struct PdbCrossReference {
    pub id: String,
    pub method: Option<String>,
    /// Ångström; absent for NMR entries
    pub resolution: Option<f64>,
    pub chain: Option<char>,
    /// UniProt positions covered by the first chain group
    pub coverage: Option<u32>,
}

impl PdbCrossReference {
    fn is_xray(&self) -> bool {
        self.method.as_deref() == Some("X-ray")
    }
}

/// X-ray first, then best resolution, then widest coverage
fn sort_cross_references(entries: &mut [PdbCrossReference]) {
    entries.sort_by(|a, b| {
        b.is_xray()
            .cmp(&a.is_xray())
            .then_with(|| {
                let ra = a.resolution.unwrap_or(f64::INFINITY);
                let rb = b.resolution.unwrap_or(f64::INFINITY);
                ra.total_cmp(&rb)
            })
            .then_with(|| b.coverage.cmp(&a.coverage))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// "1.80 A" → 1.8
fn parse_resolution(value: &str) -> Option<f64> {
    value.split_whitespace().next()?.parse().ok()
}

/// First UniProt range of a "Chains" property such as `A/B=94-312`
fn first_range(chains: &str) -> Option<(u32, u32)> {
    let (_, range) = chains.split(',').next()?.split_once('=')?;
    let (start, end) = range.trim().split_once('-')?;
    let (start, end) = (start.parse().ok()?, end.parse().ok()?);
    (start <= end).then_some((start, end))
}

/// First chain of a UniProt "Chains" property such as `A/B/C/D=94-312`
fn first_chain(chains: &str) -> Option<char> {
    chains
        .split(',')
        .next()?
        .split('=')
        .next()?
        .split('/')
        .next()?
        .trim()
        .chars()
        .next()
}

/// Reviewed human entries for a gene symbol
pub async fn search_candidates(
    client: &HttpClient,
    base_url: &str,
    symbol: &str,
    timeout: Duration,
) -> Result<Vec<UniprotCandidate>, SourceError> {
    let url = format!(
        "{}/uniprotkb/search?query=gene_exact:{}+AND+organism_id:9606+AND+reviewed:true&format=json&size=25",
        base_url.trim_end_matches('/'),
        symbol
    );
    let response: Option<SearchResponse> = client.get_json(&url, timeout).await?;
    Ok(response
        .map(|r| r.results.into_iter().map(Entry::into_candidate).collect())
        .unwrap_or_default())
}

async fn fetch_entry(
    client: &HttpClient,
    base_url: &str,
    accession: &str,
    fields: &str,
    timeout: Duration,
) -> Result<Option<Entry>, SourceError> {
    let url = format!(
        "{}/uniprotkb/{}?fields={}&format=json",
        base_url.trim_end_matches('/'),
        accession,
        fields
    );
    client.get_json(&url, timeout).await
}

/// PDB entries cross-referenced from a UniProt accession, best first
pub async fn pdb_cross_references(
    client: &HttpClient,
    base_url: &str,
    accession: &str,
    timeout: Duration,
) -> Result<Vec<PdbCrossReference>, SourceError> {
    let mut entries = fetch_entry(client, base_url, accession, "xref_pdb", timeout)
        .await?
        .map(|e| e.pdb_entries())
        .unwrap_or_default();
    sort_cross_references(&mut entries);
    Ok(entries)
}

/// GO terms of the gene's UniProt entry, one request per accession
pub struct UniprotGoSource {
    client: Arc<HttpClient>,
    base_url: String,
    timeout: Duration,
    cache: LruCache<String, Vec<GoTerm>>,
}

impl UniprotGoSource {
    pub fn new(client: Arc<HttpClient>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            timeout,
            cache: LruCache::new(256),
        }
    }
}

#[async_trait]
impl AnnotationSource for UniprotGoSource {
    fn name(&self) -> &str {
        "uniprot-go"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Functional
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(
        &self,
        _variant: &GenomicVariant,
        gene: &GeneContext,
    ) -> Result<PartialAnnotation, SourceError> {
        let terms = match self.cache.get(&gene.uniprot) {
            Some(terms) => terms,
            None => {
                let terms = fetch_entry(&self.client, &self.base_url, &gene.uniprot, "go", self.timeout)
                    .await?
                    .map(|e| e.go_terms())
                    .unwrap_or_default();
                self.cache.insert(gene.uniprot.clone(), terms.clone());
                terms
            }
        };
        Ok(PartialAnnotation {
            go_terms: Some(terms),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"{
      "results": [
        {
          "primaryAccession": "P04637",
          "entryType": "UniProtKB reviewed (Swiss-Prot)",
          "genes": [{"geneName": {"value": "TP53"}}],
          "sequence": {"length": 393}
        },
        {
          "primaryAccession": "K7PPA8",
          "entryType": "UniProtKB unreviewed (TrEMBL)",
          "genes": [{"geneName": {"value": "TP53"}}, {}]
        }
      ]
    }"#;

    const ENTRY: &str = r#"{
      "primaryAccession": "P04637",
      "uniProtKBCrossReferences": [
        {"database": "GO", "id": "GO:0003700",
         "properties": [{"key": "GoTerm", "value": "F:DNA-binding transcription factor activity"}]},
        {"database": "GO", "id": "GO:0005634",
         "properties": [{"key": "GoTerm", "value": "C:nucleus"}]},
        {"database": "PDB", "id": "1A1U",
         "properties": [{"key": "Method", "value": "NMR"}, {"key": "Chains", "value": "A/C=324-357"}]},
        {"database": "PDB", "id": "2OCJ",
         "properties": [{"key": "Method", "value": "X-ray"}, {"key": "Resolution", "value": "2.05 A"},
                        {"key": "Chains", "value": "A/B/C/D=94-312"}]},
        {"database": "PDB", "id": "2XWR",
         "properties": [{"key": "Method", "value": "X-ray"}, {"key": "Resolution", "value": "1.68 A"},
                        {"key": "Chains", "value": "A/B=94-312"}]},
        {"database": "PDB", "id": "3KMD",
         "properties": [{"key": "Method", "value": "X-ray"}, {"key": "Resolution", "value": "1.68 A"},
                        {"key": "Chains", "value": "A/B=95-289"}]}
      ]
    }"#;

    #[test]
    fn test_parse_candidates() {
        let response: SearchResponse = serde_json::from_str(SEARCH).unwrap();
        let candidates: Vec<UniprotCandidate> =
            response.results.into_iter().map(Entry::into_candidate).collect();
        assert_eq!(candidates[0].accession, "P04637");
        assert!(candidates[0].reviewed);
        assert_eq!(candidates[0].sequence_length, Some(393));
        assert!(!candidates[1].reviewed);
        assert_eq!(candidates[1].gene_names, vec!["TP53"]);
    }

    #[test]
    fn test_parse_go_terms() {
        let entry: Entry = serde_json::from_str(ENTRY).unwrap();
        let terms = entry.go_terms();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].id, "GO:0003700");
        assert_eq!(terms[0].aspect.as_deref(), Some("F"));
        assert_eq!(terms[1].name, "nucleus");
    }

    #[test]
    fn test_parse_pdb_xrefs() {
        let entry: Entry = serde_json::from_str(ENTRY).unwrap();
        let mut pdb = entry.pdb_entries();
        sort_cross_references(&mut pdb);
        let ids: Vec<&str> = pdb.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2XWR", "3KMD", "2OCJ", "1A1U"]);
        assert_eq!(pdb[0].resolution, Some(1.68));
        assert_eq!(pdb[0].coverage, Some(219));
        assert_eq!(pdb[2].chain, Some('A'));
        assert_eq!(pdb[3].resolution, None);
    }

    #[test]
    fn test_first_range() {
        assert_eq!(first_range("A/B/C/D=94-312"), Some((94, 312)));
        assert_eq!(first_range("A=1-100, B=5-50"), Some((1, 100)));
        assert_eq!(first_range("A=20-10"), None);
        assert_eq!(first_range("A"), None);
    }

    #[test]
    fn test_first_chain() {
        assert_eq!(first_chain("B/D=94-312"), Some('B'));
        assert_eq!(first_chain("A=1-100, B=1-100"), Some('A'));
        assert_eq!(first_chain(""), None);
    }
}
