use crate::error::{DocSrcError, Result};
use std::path::{Path, PathBuf};

/// Input file formats recognized by the scanner, plus the synthetic `Any`
/// filter used when walking a directory of mixed inputs (spec.md §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Any,
    Text,
    Fasta,
    FastaMulti,
    Fastq,
    Cortex,
    PackedKmers,
}

impl FileType {
    /// Classifies a path by extension, per the fixed filter table.
    pub fn of_path<P: AsRef<Path>>(path: P) -> Option<FileType> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        Some(match ext.as_str() {
            "txt" => FileType::Text,
            "ctx" => FileType::Cortex,
            "fasta" | "fna" | "fa" => FileType::Fasta,
            "fastq" | "fq" => FileType::Fastq,
            "mfasta" => FileType::FastaMulti,
            "cobs_doc" => FileType::PackedKmers,
            _ => return None,
        })
    }

    fn accepts(self, filter: FileType) -> bool {
        matches!(filter, FileType::Any) || self == filter
    }
}

/// One logical document inside an input file: `{path, type, name,
/// size_bytes, subdoc_index, term_size, term_count}` (spec.md §3.2).
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub path: PathBuf,
    pub file_type: FileType,
    pub name: String,
    pub size_bytes: u64,
    /// Selects one sub-document inside a multi-FASTA file; `0` elsewhere.
    pub subdoc_index: usize,
    pub term_size: usize,
    /// Exact or cached-estimate term count, filled in by the producer.
    pub term_count: u64,
}

impl DocumentEntry {
    pub fn new(path: PathBuf, file_type: FileType, term_size: usize) -> Result<Self> {
        let size_bytes = std::fs::metadata(&path)
            .map_err(|e| DocSrcError::io(path.clone(), e))?
            .len();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            path,
            file_type,
            name,
            size_bytes,
            subdoc_index: 0,
            term_size,
            term_count: 0,
        })
    }

    fn with_subdoc(mut self, index: usize) -> Self {
        self.name = format!("{}#{}", self.name, index);
        self.subdoc_index = index;
        self
    }
}

/// Scans `dir` recursively for files matching `filter`, sorted by path for
/// deterministic column assignment (spec.md §3.3, §5 "column assignment").
/// A multi-FASTA file expands into one entry per `>` record.
pub fn scan_documents<P: AsRef<Path>>(
    dir: P,
    filter: FileType,
    term_size: usize,
) -> Result<Vec<DocumentEntry>> {
    let mut paths: Vec<PathBuf> = walkdir_files(dir.as_ref())?;
    paths.sort();

    let mut entries = Vec::new();
    for path in paths {
        if let Some(ft) = FileType::of_path(&path) {
            if !ft.accepts(filter) {
                continue;
            }
            if ft == FileType::FastaMulti {
                let n = crate::fasta::FastaMultiFile::num_subdocs(&path)?;
                for idx in 0..n {
                    entries.push(DocumentEntry::new(path.clone(), ft, term_size)?.with_subdoc(idx));
                }
            } else {
                entries.push(DocumentEntry::new(path, ft, term_size)?);
            }
        }
    }
    Ok(entries)
}

fn walkdir_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            DocSrcError::io(
                e.path().unwrap_or(dir).to_path_buf(),
                e.into_io_error().unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed")),
            )
        })?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
