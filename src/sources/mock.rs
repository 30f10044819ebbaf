//! In-memory sources for tests and offline runs
//!
//! The fixtures are synthetic but internally consistent:
//!
//! | Gene | Strand | Transcript | Notes |
//! |------|--------|------------|-------|
//! | TP53 | - (chr17) | ENST00000269305.9 | 393 aa, codon 273 = CGT (Arg), c.818 at chr17:7577120 |
//! | DEMO1 | + (chr7) | NM_DEMO1.1 | 9 aa, two exons, plus a non-coding NR_ transcript |
//! | AMBIG1 | + (chr7) | two tied transcripts | no MANE tie-break, resolution fails |
//!
//! Every mock counts its calls and can be switched into a failing or slow
//! mode at runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::annotation::{
    AnnotationSource, ClinicalSignificance, GoTerm, PartialAnnotation, SourceKind,
    DEFAULT_SOURCE_TIMEOUT,
};
use crate::error::SourceError;
use crate::gene::{GeneContext, GeneLookup, GeneRecord, StructureSource, UniprotCandidate};
use crate::literature::{LiteratureSource, RawPublication, SearchParams};
use crate::reference::{Exon, ManeStatus, Strand, Transcript, STANDARD_CODE};
use crate::structure::{Coordinate, Residue, ResidueSegment, Structure, StructureKind};
use crate::variant::GenomicVariant;

pub const TP53_TRANSCRIPT: &str = "ENST00000269305.9";
pub const TP53_UNIPROT: &str = "P04637";
pub const TP53_PROTEIN_LENGTH: u32 = 393;
/// First and last residue of the experimental TP53 fixture (DNA-binding domain)
pub const TP53_PDB_RANGE: (u32, u32) = (94, 312);
pub const DEMO1_UNIPROT: &str = "Q9DEM1";

const SENSE_CODONS: [&str; 20] = [
    "GCT", "CGT", "AAT", "GAT", "TGT", "CAA", "GAA", "GGT", "CAT", "ATT", "CTG", "AAA", "ATG",
    "TTT", "CCT", "TCT", "ACT", "TGG", "TAT", "GTT",
];

/// Shared failure/delay switches
#[derive(Default)]
struct Behaviour {
    failure: Mutex<Option<SourceError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl Behaviour {
    /// Count the call, sleep if asked to, then report the configured failure
    async fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail_with(&self, err: SourceError) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
    }

    fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

macro_rules! behaviour_methods {
    () => {
        /// Make every following call fail with `err`
        pub fn fail_with(&self, err: SourceError) {
            self.behaviour.fail_with(err);
        }

        pub fn recover(&self) {
            self.behaviour.recover();
        }

        /// Sleep this long before answering
        pub fn set_delay(&self, delay: Duration) {
            self.behaviour.set_delay(delay);
        }

        pub fn calls(&self) -> usize {
            self.behaviour.calls()
        }
    };
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn tp53_cds() -> String {
    let mut cds = String::with_capacity(1182);
    cds.push_str("ATG");
    for codon in 2..=TP53_PROTEIN_LENGTH as usize {
        if codon == 273 {
            cds.push_str("CGT");
        } else {
            cds.push_str(SENSE_CODONS[(codon * 7) % SENSE_CODONS.len()]);
        }
    }
    cds.push_str("TGA");
    cds
}

/// TP53 canonical transcript on the minus strand of chr17
///
/// | Exon | Transcript | Genomic |
/// |------|------------|---------|
/// | 1 | 1-500 | 7578000-7578499 |
/// | 2 | 501-900 | 7577048-7577447 |
/// | 3 | 901-1202 | 7576000-7576301 |
///
/// CDS spans 11-1192, so c.818 is transcript 828 and genomic 7577120.
pub fn tp53_transcript() -> Transcript {
    let sequence = format!("GGCAGCCACC{}GCCTGGAGCC", tp53_cds());
    Transcript {
        id: TP53_TRANSCRIPT.to_string(),
        gene_symbol: Some("TP53".to_string()),
        chromosome: "17".to_string(),
        strand: Strand::Minus,
        sequence,
        cds_start: Some(11),
        cds_end: Some(1192),
        exons: vec![
            Exon::new(1, 1, 500, 7_578_000, 7_578_499),
            Exon::new(2, 501, 900, 7_577_048, 7_577_447),
            Exon::new(3, 901, 1202, 7_576_000, 7_576_301),
        ],
        mane_status: ManeStatus::Select,
    }
}

/// A shorter TP53 isoform; never canonical
fn tp53_short_isoform() -> Transcript {
    let full = tp53_transcript();
    let sequence = format!("{}TGA{}", &full.sequence[..610], "GCCTGGAGCC");
    let len = sequence.len() as u64;
    Transcript {
        id: "ENST00000413465.6".to_string(),
        cds_end: Some(len - 10),
        exons: vec![
            Exon::new(1, 1, 500, 7_578_000, 7_578_499),
            Exon::new(2, 501, len, 7_577_447 - (len - 501), 7_577_447),
        ],
        mane_status: ManeStatus::None,
        sequence,
        ..full
    }
}

/// DEMO1: plus strand, 5'UTR 5 nt, CDS 30 nt (9 aa + stop), 3'UTR 5 nt
pub fn demo1_transcript() -> Transcript {
    Transcript {
        id: "NM_DEMO1.1".to_string(),
        gene_symbol: Some("DEMO1".to_string()),
        chromosome: "7".to_string(),
        strand: Strand::Plus,
        sequence: "GCCGCATGGCTGAAAAATGGCTGCGTTTTGGTTAAAGCTT".to_string(),
        cds_start: Some(6),
        cds_end: Some(35),
        exons: vec![
            Exon::new(1, 1, 20, 100_001, 100_020),
            Exon::new(2, 21, 40, 100_101, 100_120),
        ],
        mane_status: ManeStatus::Select,
    }
}

fn demo1_noncoding() -> Transcript {
    Transcript {
        id: "NR_DEMO1.1".to_string(),
        cds_start: None,
        cds_end: None,
        mane_status: ManeStatus::None,
        ..demo1_transcript()
    }
}

fn ambig1_transcripts() -> Vec<Transcript> {
    ["NM_AMBIG1.1", "NM_AMBIG1.2"]
        .into_iter()
        .map(|id| Transcript {
            id: id.to_string(),
            gene_symbol: Some("AMBIG1".to_string()),
            mane_status: ManeStatus::None,
            ..demo1_transcript()
        })
        .collect()
}

fn candidate(accession: &str, reviewed: bool, gene: &str) -> UniprotCandidate {
    UniprotCandidate {
        accession: accession.to_string(),
        reviewed,
        gene_names: vec![gene.to_string()],
        sequence_length: None,
    }
}

/// Resolved TP53 context without a structure
pub fn tp53_context() -> GeneContext {
    GeneContext {
        symbol: "TP53".to_string(),
        transcript: tp53_transcript(),
        uniprot: TP53_UNIPROT.to_string(),
        protein_length: TP53_PROTEIN_LENGTH,
        structure: None,
    }
}

/// Cα trace along an ideal α-helix (3.8 Å between consecutive residues)
fn helix_residues(transcript: &Transcript, first: u32, last: u32) -> Vec<Residue> {
    (first..=last)
        .map(|number| {
            let angle = (number as f64) * 100f64.to_radians();
            let name = transcript
                .codon(number as u64)
                .and_then(|c| STANDARD_CODE.translate_codon(c))
                .map(|aa| aa.to_three_letter().to_ascii_uppercase())
                .unwrap_or_else(|| "UNK".to_string());
            Residue {
                number,
                name,
                ca: Coordinate::new(
                    (2.3 * angle.cos() * 1000.0).round() / 1000.0,
                    (2.3 * angle.sin() * 1000.0).round() / 1000.0,
                    (1.5 * number as f64 * 1000.0).round() / 1000.0,
                ),
                b_factor: Some(90.0),
            }
        })
        .collect()
}

/// Render residues as PDB ATOM records
fn to_pdb_text(residues: &[Residue], chain: char) -> String {
    let mut text = String::from("HEADER    SYNTHETIC FIXTURE\n");
    for (serial, r) in residues.iter().enumerate() {
        text.push_str(&format!(
            "ATOM  {:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}\n",
            serial + 1,
            " CA ",
            r.name,
            chain,
            r.number,
            r.ca.x,
            r.ca.y,
            r.ca.z,
            1.0,
            r.b_factor.unwrap_or(0.0),
            "C"
        ));
    }
    text.push_str("END\n");
    text
}

// ---------------------------------------------------------------------------
// Gene lookup
// ---------------------------------------------------------------------------

pub struct MockGeneLookup {
    records: HashMap<String, GeneRecord>,
    behaviour: Behaviour,
}

impl MockGeneLookup {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            behaviour: Behaviour::default(),
        }
    }

    /// TP53, DEMO1 and AMBIG1
    pub fn with_test_data() -> Self {
        let mut lookup = Self::new();
        lookup.add_record(GeneRecord {
            symbol: "TP53".to_string(),
            transcripts: vec![tp53_short_isoform(), tp53_transcript()],
            uniprot_candidates: vec![
                candidate("K7PPA8", false, "TP53"),
                candidate("P04637-2", true, "TP53"),
                candidate(TP53_UNIPROT, true, "TP53"),
            ],
        });
        lookup.add_record(GeneRecord {
            symbol: "DEMO1".to_string(),
            transcripts: vec![demo1_noncoding(), demo1_transcript()],
            uniprot_candidates: vec![candidate(DEMO1_UNIPROT, true, "DEMO1")],
        });
        lookup.add_record(GeneRecord {
            symbol: "AMBIG1".to_string(),
            transcripts: ambig1_transcripts(),
            uniprot_candidates: vec![candidate("Q9AMB1", true, "AMBIG1")],
        });
        lookup
    }

    pub fn add_record(&mut self, record: GeneRecord) {
        self.records.insert(record.symbol.to_ascii_uppercase(), record);
    }

    behaviour_methods!();
}

impl Default for MockGeneLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeneLookup for MockGeneLookup {
    fn name(&self) -> &str {
        "mock-genes"
    }

    async fn resolve(&self, symbol: &str) -> Result<Option<GeneRecord>, SourceError> {
        self.behaviour.enter().await?;
        Ok(self.records.get(&symbol.to_ascii_uppercase()).cloned())
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

pub struct MockStructureSource {
    name: String,
    kind: StructureKind,
    structures: HashMap<String, Structure>,
    behaviour: Behaviour,
}

impl MockStructureSource {
    pub fn new(name: &str, kind: StructureKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            structures: HashMap::new(),
            behaviour: Behaviour::default(),
        }
    }

    /// Full-length predicted models for TP53 and DEMO1
    pub fn alphafold_test_data() -> Self {
        let mut source = Self::new("mock-alphafold", StructureKind::AlphaFold);
        let tp53 = tp53_transcript();
        source.add_structure(
            TP53_UNIPROT,
            Structure::new(
                StructureKind::AlphaFold,
                "AF-P04637-F1",
                "A",
                helix_residues(&tp53, 1, TP53_PROTEIN_LENGTH),
            ),
        );
        let demo = demo1_transcript();
        source.add_structure(
            DEMO1_UNIPROT,
            Structure::new(
                StructureKind::AlphaFold,
                "AF-Q9DEM1-F1",
                "A",
                helix_residues(&demo, 1, 9),
            ),
        );
        source
    }

    /// Experimental TP53 core domain only, parsed from PDB text
    pub fn pdb_test_data() -> Self {
        let mut source = Self::new("mock-pdb", StructureKind::Pdb);
        let (first, last) = TP53_PDB_RANGE;
        let text = to_pdb_text(&helix_residues(&tp53_transcript(), first, last), 'A');
        if let Ok(structure) = Structure::from_pdb(StructureKind::Pdb, "2OCJ", &text, Some('A')) {
            source.add_structure(TP53_UNIPROT, structure);
        }
        source
    }

    /// The same core domain deposited with author numbering 1..=219
    pub fn renumbered_pdb_test_data() -> Self {
        let mut source = Self::new("mock-pdb-renumbered", StructureKind::Pdb);
        let (first, last) = TP53_PDB_RANGE;
        let offset = first - 1;
        let residues: Vec<Residue> = helix_residues(&tp53_transcript(), first, last)
            .into_iter()
            .map(|r| Residue {
                number: r.number - offset,
                ..r
            })
            .collect();
        let text = to_pdb_text(&residues, 'A');
        if let Ok(structure) = Structure::from_pdb(StructureKind::Pdb, "9P53", &text, Some('A')) {
            let segments = vec![ResidueSegment::new(first, last, 1)];
            source.add_structure(TP53_UNIPROT, structure.with_segments(segments));
        }
        source
    }

    pub fn add_structure(&mut self, uniprot: &str, structure: Structure) {
        self.structures.insert(uniprot.to_string(), structure);
    }

    behaviour_methods!();
}

#[async_trait]
impl StructureSource for MockStructureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StructureKind {
        self.kind
    }

    async fn fetch_structure(&self, uniprot: &str) -> Result<Option<Structure>, SourceError> {
        self.behaviour.enter().await?;
        Ok(self.structures.get(uniprot).cloned())
    }
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// Answers with fixed fields, optionally overridden per variant (`hgvs_g`)
pub struct MockAnnotationSource {
    name: String,
    kind: SourceKind,
    fields: PartialAnnotation,
    per_variant: HashMap<String, PartialAnnotation>,
    timeout: Mutex<Duration>,
    behaviour: Behaviour,
}

impl MockAnnotationSource {
    pub fn new(name: &str, kind: SourceKind, fields: PartialAnnotation) -> Self {
        Self {
            name: name.to_string(),
            kind,
            fields,
            per_variant: HashMap::new(),
            timeout: Mutex::new(DEFAULT_SOURCE_TIMEOUT),
            behaviour: Behaviour::default(),
        }
    }

    /// Answer `fields` for this variant instead of the default
    pub fn with_variant(mut self, variant: &GenomicVariant, fields: PartialAnnotation) -> Self {
        self.per_variant.insert(variant.hgvs_g(), fields);
        self
    }

    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner()) = timeout;
    }

    behaviour_methods!();
}

#[async_trait]
impl AnnotationSource for MockAnnotationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fetch(
        &self,
        variant: &GenomicVariant,
        _gene: &GeneContext,
    ) -> Result<PartialAnnotation, SourceError> {
        self.behaviour.enter().await?;
        Ok(self
            .per_variant
            .get(&variant.hgvs_g())
            .cloned()
            .unwrap_or_else(|| self.fields.clone()))
    }
}

/// One source per evidence kind, in the usual registration order
///
/// | Source | Kind | Fields |
/// |--------|------|--------|
/// | gnomad | population frequency | gnomad_af, gnomad_af_popmax |
/// | clinvar | clinical significance | clinvar_significance, clinvar_id |
/// | dbnsfp | in silico | cadd_phred, sift, polyphen |
/// | conservation | conservation | phylop, gerp |
/// | go | functional | go_terms |
pub fn standard_annotation_sources() -> Vec<std::sync::Arc<MockAnnotationSource>> {
    use std::sync::Arc;
    vec![
        Arc::new(MockAnnotationSource::new(
            "gnomad",
            SourceKind::PopulationFrequency,
            PartialAnnotation {
                gnomad_af: Some(0.000012),
                gnomad_af_popmax: Some(0.000031),
                ..Default::default()
            },
        )),
        Arc::new(MockAnnotationSource::new(
            "clinvar",
            SourceKind::ClinicalSignificance,
            PartialAnnotation {
                clinvar_significance: Some(ClinicalSignificance::Pathogenic),
                clinvar_id: Some("12366".to_string()),
                ..Default::default()
            },
        )),
        Arc::new(MockAnnotationSource::new(
            "dbnsfp",
            SourceKind::InSilico,
            PartialAnnotation {
                cadd_phred: Some(28.6),
                sift: Some(0.0),
                polyphen: Some(1.0),
                ..Default::default()
            },
        )),
        Arc::new(MockAnnotationSource::new(
            "conservation",
            SourceKind::Conservation,
            PartialAnnotation {
                phylop: Some(7.9),
                gerp: Some(5.4),
                ..Default::default()
            },
        )),
        Arc::new(MockAnnotationSource::new(
            "go",
            SourceKind::Functional,
            PartialAnnotation {
                go_terms: Some(vec![GoTerm {
                    id: "GO:0003700".to_string(),
                    name: "DNA-binding transcription factor activity".to_string(),
                    aspect: Some("F".to_string()),
                }]),
                ..Default::default()
            },
        )),
    ]
}

// ---------------------------------------------------------------------------
// Literature
// ---------------------------------------------------------------------------

pub struct MockLiteratureSource {
    publications: Vec<RawPublication>,
    behaviour: Behaviour,
}

impl MockLiteratureSource {
    pub fn new(publications: Vec<RawPublication>) -> Self {
        Self {
            publications,
            behaviour: Behaviour::default(),
        }
    }

    /// Three TP53 papers, two of them about R273H
    pub fn with_test_data() -> Self {
        let paper = |pmid: &str, year: i32, title: &str, abstract_text: &str| RawPublication {
            pmid: Some(pmid.to_string()),
            pmcid: None,
            title: title.to_string(),
            authors: vec!["Doe J".to_string(), "Roe R".to_string()],
            year: Some(year),
            journal: Some("J Synthetic Biol".to_string()),
            abstract_text: Some(abstract_text.to_string()),
            full_text: None,
        };
        Self::new(vec![
            paper(
                "15607980",
                2004,
                "Gain of function of a TP53 hot spot mutation",
                "The p.Arg273His mutation abolishes sequence-specific DNA binding. \
                 Mutant TP53 enhances invasion in cell-based assays.",
            ),
            paper(
                "20959462",
                2010,
                "TP53 variants in a population cohort",
                "We genotyped rs28934576 and c.818G>A in 2,000 patients. \
                 No association with survival was found.",
            ),
            paper(
                "9000001",
                2018,
                "Structure of the TP53 DNA-binding domain",
                "Crystal structures of the core domain were solved. \
                 Residue 273 contacts the DNA backbone.",
            ),
        ])
    }

    behaviour_methods!();
}

#[async_trait]
impl LiteratureSource for MockLiteratureSource {
    fn name(&self) -> &str {
        "mock-literature"
    }

    async fn search(
        &self,
        gene: &str,
        _variant: Option<&str>,
        params: &SearchParams,
    ) -> Result<Vec<RawPublication>, SourceError> {
        self.behaviour.enter().await?;
        let gene = gene.to_lowercase();
        Ok(self
            .publications
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&gene)
                    || p.abstract_text
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&gene))
            })
            .take(params.depth as usize)
            .cloned()
            .collect())
    }
}
