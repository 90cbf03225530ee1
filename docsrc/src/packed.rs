use crate::bases::{pack, unpack};
use crate::error::{DocSrcError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Reader for the builder's own intermediate `.cobs_doc` dump: a flat
/// sequence of `⌈k/4⌉`-byte packed k-mers, all of the same, already fixed
/// term size (spec.md §4.3 "Packed k-mer dump").
pub struct PackedFile {
    path: PathBuf,
}

impl PackedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn record_size(term_size: usize) -> usize {
        (term_size + 3) / 4
    }

    pub fn num_terms(&self, term_size: usize) -> Result<u64> {
        let size = std::fs::metadata(&self.path)
            .map_err(|e| DocSrcError::io(self.path.clone(), e))?
            .len();
        let rec = Self::record_size(term_size) as u64;
        Ok(size / rec)
    }

    pub fn process_terms(&self, term_size: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| DocSrcError::io(self.path.clone(), e))?;
        let mut reader = BufReader::new(file);
        let rec = Self::record_size(term_size);
        let mut buf = vec![0u8; rec];
        loop {
            match reader.read_exact(&mut buf) {
                Ok(()) => {
                    let term = unpack(&buf, term_size);
                    callback(&term);
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DocSrcError::io(self.path.clone(), e)),
            }
        }
        Ok(())
    }
}

/// Writer used by the builder to spill a document's terms to disk in
/// packed form ahead of a later combine pass.
pub struct PackedWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl PackedWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| DocSrcError::io(path.clone(), e))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn write_term(&mut self, term: &[u8]) -> Result<()> {
        let packed = pack(term);
        self.writer
            .write_all(&packed)
            .map_err(|e| DocSrcError::io(self.path.clone(), e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| DocSrcError::io(self.path.clone(), e))
    }
}
