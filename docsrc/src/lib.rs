//! Lazy term producers over the DNA sequence file formats COBS indexes:
//! raw text, FASTA (single and multi-record), FASTQ, Cortex graphs, and
//! the builder's own packed k-mer dumps.
//!
//! Every producer exposes the same two operations, `num_terms` and
//! `process_terms`, so the builder can treat a directory of mixed input
//! formats uniformly through [`source::DocumentSource`].

mod bases;
mod cortex;
mod entry;
mod error;
mod fasta;
mod fastq;
mod packed;
mod raw;
mod reader;
mod source;

pub use entry::{scan_documents, DocumentEntry, FileType};
pub use error::{DocSrcError, Result};
pub use fasta::{FastaFile, FastaMultiFile};
pub use fastq::FastqFile;
pub use cortex::CortexFile;
pub use packed::{PackedFile, PackedWriter};
pub use raw::TextFile;
pub use source::DocumentSource;
