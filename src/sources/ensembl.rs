//! Ensembl REST gene lookup
//!
//! Symbol lookup with `expand=1` returns every transcript with its exons and
//! translation span in genomic coordinates. The spliced cDNA of each coding
//! transcript is fetched separately and the exon model is rebuilt in
//! transcript coordinates. UniProt candidates come from the UniProt search.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::debug;

use super::http_client::HttpClient;
use super::uniprot;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::gene::{GeneLookup, GeneRecord};
use crate::reference::{Exon, ManeStatus, Strand, Transcript, TxLocation};

#[derive(Debug, Deserialize)]
struct EnsemblGene {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "Transcript")]
    transcripts: Vec<EnsemblTranscript>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnsemblTranscript {
    id: String,
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    biotype: String,
    #[serde(default)]
    is_canonical: u8,
    seq_region_name: String,
    strand: i8,
    #[serde(default, rename = "Exon")]
    exons: Vec<EnsemblSpan>,
    #[serde(default, rename = "Translation")]
    translation: Option<EnsemblTranslation>,
    #[serde(default, rename = "MANE")]
    mane: Vec<EnsemblMane>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct EnsemblSpan {
    start: u64,
    end: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct EnsemblTranslation {
    start: u64,
    end: u64,
    #[serde(default)]
    length: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnsemblMane {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct EnsemblSequence {
    seq: String,
}

impl EnsemblTranscript {
    fn versioned_id(&self) -> String {
        match self.version {
            Some(v) => format!("{}.{}", self.id, v),
            None => self.id.clone(),
        }
    }

    fn is_protein_coding(&self) -> bool {
        self.biotype == "protein_coding" && self.translation.is_some()
    }

    /// MANE type when annotated; otherwise the Ensembl canonical flag stands in for Select
    fn mane_status(&self) -> ManeStatus {
        let mut status = ManeStatus::None;
        for m in &self.mane {
            match m.kind.as_str() {
                "MANE_Select" => return ManeStatus::Select,
                "MANE_Plus_Clinical" => status = ManeStatus::PlusClinical,
                _ => {}
            }
        }
        if status == ManeStatus::None && self.is_canonical == 1 {
            ManeStatus::Select
        } else {
            status
        }
    }
}

/// Rebuild a transcript model from an Ensembl record and its cDNA
fn build_transcript(symbol: &str, tx: &EnsemblTranscript, sequence: String) -> Option<Transcript> {
    let strand = if tx.strand < 0 {
        Strand::Minus
    } else {
        Strand::Plus
    };

    let mut spans = tx.exons.clone();
    match strand {
        Strand::Plus => spans.sort_by_key(|e| e.start),
        Strand::Minus => spans.sort_by_key(|e| std::cmp::Reverse(e.start)),
    }

    let mut exons = Vec::with_capacity(spans.len());
    let mut tx_pos = 1;
    for (i, span) in spans.iter().enumerate() {
        let len = span.end.checked_sub(span.start)? + 1;
        exons.push(Exon::new(
            i as u32 + 1,
            tx_pos,
            tx_pos + len - 1,
            span.start,
            span.end,
        ));
        tx_pos += len;
    }

    let mut transcript = Transcript {
        id: tx.versioned_id(),
        gene_symbol: Some(symbol.to_string()),
        chromosome: tx.seq_region_name.clone(),
        strand,
        sequence: sequence.to_ascii_uppercase(),
        cds_start: None,
        cds_end: None,
        exons,
        mane_status: tx.mane_status(),
    };

    if let Some(translation) = tx.translation {
        let (first, last) = match strand {
            Strand::Plus => (translation.start, translation.end),
            Strand::Minus => (translation.end, translation.start),
        };
        let (TxLocation::Exonic(cds_start), TxLocation::Exonic(mut cds_end)) =
            (transcript.genomic_to_tx(first), transcript.genomic_to_tx(last))
        else {
            return None;
        };
        // Translation spans sometimes stop short of the stop codon
        if let Some(aa) = translation.length {
            if cds_end + 1 - cds_start == aa * 3 && cds_end + 3 <= transcript.sequence_length() {
                cds_end += 3;
            }
        }
        transcript.cds_start = Some(cds_start);
        transcript.cds_end = Some(cds_end);
    }

    Some(transcript)
}

/// [`GeneLookup`] backed by the Ensembl and UniProt REST APIs
pub struct EnsemblGeneLookup {
    client: Arc<HttpClient>,
    ensembl: SourceConfig,
    uniprot: SourceConfig,
}

impl EnsemblGeneLookup {
    pub fn new(client: Arc<HttpClient>, ensembl: SourceConfig, uniprot: SourceConfig) -> Self {
        Self {
            client,
            ensembl,
            uniprot,
        }
    }

    fn base(&self) -> &str {
        self.ensembl.base_url.trim_end_matches('/')
    }

    async fn fetch_cdna(&self, id: &str) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}/sequence/id/{}?type=cdna&content-type=application/json",
            self.base(),
            id
        );
        let seq: Option<EnsemblSequence> = self.client.get_json(&url, self.ensembl.timeout()).await?;
        Ok(seq.map(|s| s.seq))
    }
}

#[async_trait]
impl GeneLookup for EnsemblGeneLookup {
    fn name(&self) -> &str {
        "ensembl"
    }

    async fn resolve(&self, symbol: &str) -> Result<Option<GeneRecord>, SourceError> {
        let encoded: String = url::form_urlencoded::byte_serialize(symbol.as_bytes()).collect();
        let url = format!(
            "{}/lookup/symbol/homo_sapiens/{}?expand=1&mane=1&content-type=application/json",
            self.base(),
            encoded
        );
        let Some(gene) = self
            .client
            .get_json::<EnsemblGene>(&url, self.ensembl.timeout())
            .await?
        else {
            return Ok(None);
        };

        let coding: Vec<&EnsemblTranscript> = gene
            .transcripts
            .iter()
            .filter(|t| t.is_protein_coding())
            .collect();
        let sequences = join_all(coding.iter().map(|t| self.fetch_cdna(&t.id))).await;

        let mut transcripts = Vec::with_capacity(coding.len());
        for (tx, seq) in coding.into_iter().zip(sequences) {
            match seq? {
                Some(seq) => match build_transcript(symbol, tx, seq) {
                    Some(t) => transcripts.push(t),
                    None => debug!(transcript = %tx.id, "translation outside exon model, skipped"),
                },
                None => debug!(transcript = %tx.id, "no cDNA sequence, skipped"),
            }
        }

        let uniprot_candidates = uniprot::search_candidates(
            &self.client,
            &self.uniprot.base_url,
            symbol,
            self.uniprot.timeout(),
        )
        .await?;

        debug!(
            gene = symbol,
            display_name = gene.display_name.as_deref().unwrap_or(""),
            transcripts = transcripts.len(),
            candidates = uniprot_candidates.len(),
            "ensembl lookup complete"
        );

        Ok(Some(GeneRecord {
            symbol: symbol.to_string(),
            transcripts,
            uniprot_candidates,
        }))
    }
}
