//! Transcript models and the genetic code
//!
//! Everything the coordinate mapper needs to walk from a genomic position to
//! an amino acid without any network access.

pub mod codon;
pub mod transcript;

pub use codon::{reverse_complement, AminoAcid, Base, Codon, CodonTable, STANDARD_CODE};
pub use transcript::{CdsLocation, Exon, ManeStatus, Strand, Transcript, TxLocation};
