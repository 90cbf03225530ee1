//! Random-access row fetch over a built index: mmap by default, or a
//! fully-buffered aligned read when `Environment::load_complete_index` is
//! set (spec.md §4.8, §6.5).

pub mod mmap;
#[cfg(feature = "aio")]
pub mod aio;

use crate::env::Environment;
use crate::error::Result;
use std::path::Path;

/// Metadata a query needs before it can issue `read_rows` calls.
pub struct Metadata {
    pub term_size: u32,
    pub canonical: bool,
    /// One `(sig_size, num_hashes)` per parameter block; classic indexes
    /// have exactly one.
    pub blocks: Vec<(u64, u64)>,
    /// Row size in bytes, shared by every block (for a classic index this
    /// is simply that index's own row size).
    pub page_size: u64,
    pub file_names: Vec<String>,
}

impl Metadata {
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_columns(&self) -> u64 {
        self.file_names.len() as u64
    }

    /// Number of actual documents in each parameter block — every block
    /// but the last holds exactly `8 × page_size` documents; the last
    /// holds whatever remains (spec.md §4.7 step 2).
    pub fn block_doc_counts(&self) -> Vec<u64> {
        if self.blocks.len() <= 1 {
            return vec![self.file_names.len() as u64];
        }
        let bucket_size = 8 * self.page_size;
        let mut remaining = self.file_names.len() as u64;
        let mut counts = Vec::with_capacity(self.blocks.len());
        for _ in 0..self.blocks.len() {
            let take = bucket_size.min(remaining);
            counts.push(take);
            remaining -= take;
        }
        counts
    }
}

/// Backend over a classic or compact index file, mmap- or AIO-backed,
/// expressed as a closed tagged variant rather than a trait object — the
/// backend set is fixed and dispatch happens once per query, not once
/// per row (spec.md §9 "Inheritance → tagged variant").
///
/// `read_row_slice` returns an owned row rather than a borrow: the AIO
/// backend has no stable backing memory to borrow from, so every
/// backend pays the same cost as the slowest one.
pub trait SearchFile {
    fn metadata(&self) -> &Metadata;

    /// Returns `len` bytes of block `block`'s row `row`, starting at byte
    /// `byte_offset` within that row.
    fn read_row_slice(&self, block: usize, row: u64, byte_offset: u64, len: u64) -> Result<Vec<u8>>;

    /// For each hash in `hashes`, for each parameter block, fetches the
    /// `[score_begin, score_begin + score_size_bytes)` slice of row
    /// `hash mod sig_size` into `out_buf` at successive `row_stride`
    /// offsets (spec.md §4.8).
    fn read_rows(
        &self,
        hashes: &[u64],
        out_buf: &mut [u8],
        score_begin: u64,
        score_size_bytes: u64,
        row_stride: u64,
    ) -> Result<()> {
        let meta = self.metadata();
        let mut idx = 0usize;
        for &h in hashes {
            for block in 0..meta.num_blocks() {
                let (sig_size, _) = meta.blocks[block];
                let row = h % sig_size;
                let slice = self.read_row_slice(block, row, score_begin, score_size_bytes)?;
                let dst_start = idx * row_stride as usize;
                out_buf[dst_start..dst_start + score_size_bytes as usize].copy_from_slice(&slice);
                idx += 1;
            }
        }
        Ok(())
    }
}

pub use self::mmap::{ClassicSearchFile, CompactSearchFile};

/// Opens either index format, chosen by file extension, honoring
/// `env.load_complete_index` and, for a compact index with the `aio`
/// feature enabled, `env.use_aio`.
pub enum IndexFile {
    Classic(ClassicSearchFile),
    Compact(CompactSearchFile),
    #[cfg(feature = "aio")]
    CompactAio(self::aio::CompactAioFile),
}

impl IndexFile {
    pub fn open(path: impl AsRef<Path>, env: &Environment) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("cobs_compact") => {
                #[cfg(feature = "aio")]
                if env.use_aio {
                    return Ok(IndexFile::CompactAio(self::aio::CompactAioFile::open(path)?));
                }
                Ok(IndexFile::Compact(CompactSearchFile::open(path, env)?))
            }
            _ => Ok(IndexFile::Classic(ClassicSearchFile::open(path, env)?)),
        }
    }
}

impl SearchFile for IndexFile {
    fn metadata(&self) -> &Metadata {
        match self {
            IndexFile::Classic(f) => f.metadata(),
            IndexFile::Compact(f) => f.metadata(),
            #[cfg(feature = "aio")]
            IndexFile::CompactAio(f) => f.metadata(),
        }
    }

    fn read_row_slice(&self, block: usize, row: u64, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        match self {
            IndexFile::Classic(f) => f.read_row_slice(block, row, byte_offset, len),
            IndexFile::Compact(f) => f.read_row_slice(block, row, byte_offset, len),
            #[cfg(feature = "aio")]
            IndexFile::CompactAio(f) => f.read_row_slice(block, row, byte_offset, len),
        }
    }
}
