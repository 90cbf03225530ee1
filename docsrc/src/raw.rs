use crate::error::{DocSrcError, Result};
use crate::reader::{dyn_reader, BUFSIZE};
use std::io::BufRead;
use std::path::PathBuf;

/// Raw-text producer: slides a window of size `k` over each line of the
/// file; newlines separate runs (spec.md §4.3 "Raw text").
pub struct TextFile {
    path: PathBuf,
}

impl TextFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn for_each_line(&self, mut on_line: impl FnMut(&[u8])) -> Result<()> {
        let inner = dyn_reader(&self.path).map_err(|e| DocSrcError::io(self.path.clone(), e))?;
        let mut reader = std::io::BufReader::with_capacity(BUFSIZE, inner);
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| DocSrcError::io(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            on_line(&line);
        }
        Ok(())
    }

    pub fn num_terms(&self, k: usize) -> Result<u64> {
        let mut count = 0u64;
        self.for_each_line(|line| {
            if line.len() >= k {
                count += (line.len() - k + 1) as u64;
            }
        })?;
        Ok(count)
    }

    pub fn process_terms(&self, k: usize, mut callback: impl FnMut(&[u8])) -> Result<()> {
        self.for_each_line(|line| {
            if line.len() >= k {
                for w in line.windows(k) {
                    callback(w);
                }
            }
        })
    }
}
