use crate::error::{DocSrcError, Result};
use crate::reader::{dyn_reader, trim_end, BUFSIZE};
use std::io::BufRead;
use std::path::PathBuf;

/// One `>header` record: its concatenated sequence bytes, with internal
/// line breaks removed.
struct FastaRecord {
    seq: Vec<u8>,
}

fn for_each_record(path: &PathBuf, mut on_record: impl FnMut(FastaRecord)) -> Result<()> {
    let reader = dyn_reader(path).map_err(|e| DocSrcError::io(path.clone(), e))?;
    let mut reader = std::io::BufReader::with_capacity(BUFSIZE, reader);

    let mut line = Vec::new();
    let mut seq = Vec::new();
    let mut in_record = false;

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| DocSrcError::io(path.clone(), e))?;
        if n == 0 {
            break;
        }
        trim_end(&mut line);
        if line.starts_with(b">") {
            if in_record {
                on_record(FastaRecord {
                    seq: std::mem::take(&mut seq),
                });
            }
            in_record = true;
            seq.clear();
        } else if in_record {
            seq.extend_from_slice(&line);
        }
    }
    if in_record {
        on_record(FastaRecord { seq });
    }
    Ok(())
}

fn slide(seq: &[u8], k: usize, mut callback: impl FnMut(&[u8])) {
    if seq.len() >= k {
        for w in seq.windows(k) {
            callback(w);
        }
    }
}

/// FASTA (single document): every `>` record in the file belongs to the
/// same document; a k-mer window never crosses a record boundary
/// (spec.md §4.3).
pub struct FastaFile {
    path: PathBuf,
}

impl FastaFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn num_terms(&self, k: usize) -> Result<u64> {
        let mut count = 0u64;
        for_each_record(&self.path, |rec| {
            if rec.seq.len() >= k {
                count += (rec.seq.len() - k + 1) as u64;
            }
        })?;
        Ok(count)
    }

    pub fn process_terms(&self, k: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        for_each_record(&self.path, |rec| slide(&rec.seq, k, &mut callback))
    }
}

/// FASTA multi: each `>` header starts a distinct sub-document;
/// `subdoc_index` selects which record is processed (spec.md §4.3).
pub struct FastaMultiFile {
    path: PathBuf,
    subdoc_index: usize,
}

impl FastaMultiFile {
    pub fn new(path: PathBuf, subdoc_index: usize) -> Self {
        Self { path, subdoc_index }
    }

    /// Number of sub-documents (`>` records) in the file.
    pub fn num_subdocs(path: &PathBuf) -> Result<usize> {
        let mut count = 0usize;
        for_each_record(path, |_| count += 1)?;
        Ok(count)
    }

    pub fn num_terms(&self, k: usize) -> Result<u64> {
        let mut count = 0u64;
        let mut idx = 0usize;
        let target = self.subdoc_index;
        for_each_record(&self.path, |rec| {
            if idx == target && rec.seq.len() >= k {
                count = (rec.seq.len() - k + 1) as u64;
            }
            idx += 1;
        })?;
        Ok(count)
    }

    pub fn process_terms(&self, k: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        let mut idx = 0usize;
        let target = self.subdoc_index;
        for_each_record(&self.path, |rec| {
            if idx == target {
                slide(&rec.seq, k, &mut callback);
            }
            idx += 1;
        })
    }
}
