use crate::error::{DocSrcError, Result};
use crate::reader::{dyn_reader, trim_end, BUFSIZE};
use std::io::BufRead;
use std::path::PathBuf;

/// FASTQ: every 4th line (the sequence line of each record) is treated as
/// a FASTA record — a single contiguous run a k-mer window never crosses
/// out of (spec.md §4.3).
pub struct FastqFile {
    path: PathBuf,
}

impl FastqFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn for_each_seq_line(&self, mut on_seq: impl FnMut(&[u8])) -> Result<()> {
        let reader = dyn_reader(&self.path).map_err(|e| DocSrcError::io(self.path.clone(), e))?;
        let mut reader = std::io::BufReader::with_capacity(BUFSIZE, reader);

        let mut line = Vec::new();
        let mut line_no = 0u64;
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| DocSrcError::io(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            if line_no % 4 == 1 {
                trim_end(&mut line);
                on_seq(&line);
            }
            line_no += 1;
        }
        Ok(())
    }

    pub fn num_terms(&self, k: usize) -> Result<u64> {
        let mut count = 0u64;
        self.for_each_seq_line(|seq| {
            if seq.len() >= k {
                count += (seq.len() - k + 1) as u64;
            }
        })?;
        Ok(count)
    }

    pub fn process_terms(&self, k: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        self.for_each_seq_line(|seq| {
            if seq.len() >= k {
                for w in seq.windows(k) {
                    callback(w);
                }
            }
        })
    }
}
