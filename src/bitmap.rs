//! In-memory Bloom row bitmap: `m` rows by `w` columns (documents), stored
//! row-major with `⌈w/8⌉` bytes per row.

use crate::error::{CobsError, Result};
use crate::hash::process_hashes;
use crate::kmer::canonical_form;
use docsrc::DocumentSource;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU8, Ordering};

/// Row size in bytes for a bitmap with `w` columns.
pub fn row_size_bytes(w: u64) -> u64 {
    (w + 7) / 8
}

/// A dense `m × row_size_bytes(w)` bit matrix. Once a bit is set it is
/// never cleared (spec.md §3.3).
pub struct Bitmap {
    m: u64,
    w: u64,
    row_bytes: u64,
    data: Vec<u8>,
}

impl Bitmap {
    /// Allocates `m × ⌈w/8⌉` zero bytes.
    pub fn new(m: u64, w: u64) -> Self {
        let row_bytes = row_size_bytes(w);
        let data = vec![0u8; (m * row_bytes) as usize];
        Self { m, w, row_bytes, data }
    }

    pub fn signature_size(&self) -> u64 {
        self.m
    }

    pub fn width(&self) -> u64 {
        self.w
    }

    pub fn row_bytes(&self) -> u64 {
        self.row_bytes
    }

    /// Sets bit `j` in row `r`.
    pub fn set(&mut self, r: u64, j: u64) {
        let byte_index = (r * self.row_bytes + j / 8) as usize;
        let bit = 7 - (j % 8) as u8; // MSB-first within a row byte
        self.data[byte_index] |= 1 << bit;
    }

    pub fn is_set(&self, r: u64, j: u64) -> bool {
        let byte_index = (r * self.row_bytes + j / 8) as usize;
        let bit = 7 - (j % 8) as u8;
        self.data[byte_index] & (1 << bit) != 0
    }

    pub fn row(&self, r: u64) -> &[u8] {
        let start = (r * self.row_bytes) as usize;
        &self.data[start..start + self.row_bytes as usize]
    }

    pub fn popcount_column(&self, j: u64) -> u32 {
        let mut count = 0u32;
        for r in 0..self.m {
            if self.is_set(r, j) {
                count += 1;
            }
        }
        count
    }

    pub fn popcount_all(&self) -> u64 {
        self.data.iter().map(|b| b.count_ones() as u64).sum()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Populates a sub-index's bitmap from a batch of documents `docs[0..w)`:
/// one thread per document so columns never conflict, matching the
/// simplest correct strategy named by spec.md §4.4.
pub fn build_from_batch(
    docs: &[(DocumentSource, usize)],
    canonical: bool,
    m: u64,
    h: u64,
) -> Result<Bitmap> {
    let w = docs.len() as u64;
    let row_bytes = row_size_bytes(w);
    let cells: Vec<AtomicU8> = (0..(m * row_bytes) as usize).map(|_| AtomicU8::new(0)).collect();

    docs.par_iter()
        .enumerate()
        .try_for_each(|(j, (source, term_size))| -> Result<()> {
            let j = j as u64;
            source.process_terms(*term_size, |term| {
                let canon = match canonical_form(term, canonical) {
                    Ok(c) => c,
                    Err(_) => return,
                };
                process_hashes(&canon, m, h, |r| {
                    let byte_index = (r * row_bytes + j / 8) as usize;
                    let bit = 1u8 << (7 - (j % 8) as u8);
                    cells[byte_index].fetch_or(bit, Ordering::Relaxed);
                });
            })?;
            Ok(())
        })?;

    let data: Vec<u8> = cells.into_iter().map(|c| c.into_inner()).collect();
    Ok(Bitmap {
        m,
        w,
        row_bytes,
        data,
    })
}

/// Sets `h` hash rows for one already-canonicalized term in column `j`.
/// Single-threaded helper for callers driving their own document loop.
pub fn set_term(bitmap: &mut Bitmap, term: &[u8], canonical: bool, h: u64, j: u64) -> Result<()> {
    let canon = canonical_form(term, canonical)?;
    let m = bitmap.signature_size();
    if j >= bitmap.width() {
        return Err(CobsError::usage(format!(
            "column {j} out of range for width {}",
            bitmap.width()
        )));
    }
    process_hashes(&canon, m, h, |r| bitmap.set(r, j));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query_round_trip() {
        let mut b = Bitmap::new(64, 16);
        b.set(3, 5);
        assert!(b.is_set(3, 5));
        assert!(!b.is_set(3, 6));
        assert_eq!(b.popcount_column(5), 1);
    }

    #[test]
    fn row_bytes_rounds_up() {
        assert_eq!(row_size_bytes(9), 2);
        assert_eq!(row_size_bytes(16), 2);
        assert_eq!(row_size_bytes(17), 3);
    }

    #[test]
    fn popcount_all_counts_every_set_bit() {
        let mut b = Bitmap::new(8, 8);
        b.set(0, 0);
        b.set(0, 1);
        b.set(7, 7);
        assert_eq!(b.popcount_all(), 3);
    }

    #[test]
    fn set_term_rejects_out_of_range_column() {
        let mut b = Bitmap::new(64, 8);
        let err = set_term(&mut b, b"ACGTACGTACGTACGTACGTACGTACGTACG", true, 3, 8);
        assert!(err.is_err());
    }
}
