use crate::cortex::CortexFile;
use crate::entry::{DocumentEntry, FileType};
use crate::error::Result;
use crate::fasta::{FastaFile, FastaMultiFile};
use crate::fastq::FastqFile;
use crate::packed::PackedFile;
use crate::raw::TextFile;

/// A term producer over one document. A closed tagged-variant rather than
/// a trait object: the set of file formats is fixed, and dispatch this way
/// avoids a vtable indirection per term (spec.md §9, "inheritance").
pub enum DocumentSource {
    Text(TextFile),
    Fasta(FastaFile),
    FastaMulti(FastaMultiFile),
    Fastq(FastqFile),
    Cortex(CortexFile),
    Packed(PackedFile),
}

impl DocumentSource {
    pub fn from_entry(entry: &DocumentEntry) -> Self {
        match entry.file_type {
            FileType::Text => DocumentSource::Text(TextFile::new(entry.path.clone())),
            FileType::Fasta => DocumentSource::Fasta(FastaFile::new(entry.path.clone())),
            FileType::FastaMulti => {
                DocumentSource::FastaMulti(FastaMultiFile::new(entry.path.clone(), entry.subdoc_index))
            }
            FileType::Fastq => DocumentSource::Fastq(FastqFile::new(entry.path.clone())),
            FileType::Cortex => DocumentSource::Cortex(CortexFile::new(entry.path.clone())),
            FileType::PackedKmers => DocumentSource::Packed(PackedFile::new(entry.path.clone())),
            FileType::Any => unreachable!("scan_documents never tags an entry Any"),
        }
    }

    pub fn num_terms(&self, term_size: usize) -> Result<u64> {
        match self {
            DocumentSource::Text(f) => f.num_terms(term_size),
            DocumentSource::Fasta(f) => f.num_terms(term_size),
            DocumentSource::FastaMulti(f) => f.num_terms(term_size),
            DocumentSource::Fastq(f) => f.num_terms(term_size),
            DocumentSource::Cortex(f) => f.num_terms(term_size),
            DocumentSource::Packed(f) => f.num_terms(term_size),
        }
    }

    pub fn process_terms(&self, term_size: usize, callback: impl FnMut(&[u8])) -> Result<()> {
        match self {
            DocumentSource::Text(f) => f.process_terms(term_size, callback),
            DocumentSource::Fasta(f) => f.process_terms(term_size, callback),
            DocumentSource::FastaMulti(f) => f.process_terms(term_size, callback),
            DocumentSource::Fastq(f) => f.process_terms(term_size, callback),
            DocumentSource::Cortex(f) => f.process_terms(term_size, callback),
            DocumentSource::Packed(f) => f.process_terms(term_size, callback),
        }
    }
}
