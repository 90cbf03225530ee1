//! `mmap(PROT_READ, MAP_PRIVATE)` search backend, with `MADV_RANDOM`
//! advice and a fully-buffered fallback for `load_complete_index`
//! (spec.md §4.8).

use super::{Metadata, SearchFile};
use crate::env::Environment;
use crate::error::{CobsError, Result};
use crate::format::{classic, compact};
use crate::utils::{AlignedBuffer, LOAD_COMPLETE_ALIGNMENT};
use memmap2::{Advice, Mmap, MmapOptions};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

enum Backing {
    Mmap(Mmap),
    Buffer(AlignedBuffer),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => &m[..],
            Backing::Buffer(b) => b.as_slice(),
        }
    }

    fn open(path: &Path, payload_offset: u64, payload_len: u64, env: &Environment) -> Result<Self> {
        if env.load_complete_index {
            let mut file = File::open(path).map_err(CobsError::Io)?;
            file.seek(SeekFrom::Start(payload_offset)).map_err(CobsError::Io)?;
            let mut buf = AlignedBuffer::new(payload_len as usize, LOAD_COMPLETE_ALIGNMENT);
            file.read_exact(buf.as_mut_slice()).map_err(CobsError::Io)?;
            Ok(Backing::Buffer(buf))
        } else {
            let file = File::open(path).map_err(CobsError::Io)?;
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(payload_offset)
                    .len(payload_len as usize)
                    .map(&file)
                    .map_err(|e| CobsError::resource(format!("mmap failed: {e}")))?
            };
            let _ = mmap.advise(Advice::Random);
            Ok(Backing::Mmap(mmap))
        }
    }
}

pub struct ClassicSearchFile {
    metadata: Metadata,
    row_bytes: u64,
    backing: Backing,
}

impl ClassicSearchFile {
    pub fn open(path: impl AsRef<Path>, env: &Environment) -> Result<Self> {
        let path = path.as_ref();
        let (header, payload_offset) = classic::read_header(path)?;
        let row_bytes = header.row_bytes();
        let payload_len = header.sig_size * row_bytes;
        let backing = Backing::open(path, payload_offset, payload_len, env)?;

        let metadata = Metadata {
            term_size: header.term_size,
            canonical: header.canonical,
            blocks: vec![(header.sig_size, header.num_hashes)],
            page_size: row_bytes,
            file_names: header.file_names,
        };
        Ok(Self {
            metadata,
            row_bytes,
            backing,
        })
    }
}

impl SearchFile for ClassicSearchFile {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn read_row_slice(&self, block: usize, row: u64, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        if block != 0 {
            return Err(CobsError::usage("classic index has a single block"));
        }
        let start = (row * self.row_bytes + byte_offset) as usize;
        let end = start + len as usize;
        self.backing
            .as_slice()
            .get(start..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| CobsError::resource("row slice out of range"))
    }
}

pub struct CompactSearchFile {
    metadata: Metadata,
    page_size: u64,
    block_offsets: Vec<u64>,
    backing: Backing,
}

impl CompactSearchFile {
    pub fn open(path: impl AsRef<Path>, env: &Environment) -> Result<Self> {
        let path = path.as_ref();
        let (header, payload_offset) = compact::read_header(path)?;
        let payload_len = header.total_payload_len();
        let backing = Backing::open(path, payload_offset, payload_len, env)?;

        let block_offsets = (0..header.params.len()).map(|p| header.block_offset(p)).collect();
        let metadata = Metadata {
            term_size: header.term_size,
            canonical: header.canonical,
            blocks: header.params.iter().map(|p| (p.sig_size, p.num_hashes)).collect(),
            page_size: header.page_size,
            file_names: header.file_names,
        };
        Ok(Self {
            metadata,
            page_size: header.page_size,
            block_offsets,
            backing,
        })
    }
}

impl SearchFile for CompactSearchFile {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn read_row_slice(&self, block: usize, row: u64, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        let block_start = *self
            .block_offsets
            .get(block)
            .ok_or_else(|| CobsError::usage(format!("block {block} out of range")))?;
        let start = (block_start + row * self.page_size + byte_offset) as usize;
        let end = start + len as usize;
        self.backing
            .as_slice()
            .get(start..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| CobsError::resource("row slice out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::classic::{build, ClassicBuildParams};
    use crate::build::{construct_random, load_document_entries};
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn mmap_and_buffered_backends_agree() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let docs_dir = dir.path().join("docs");
        construct_random(&docs_dir, 12, 800, 31, |_| 1, &mut rng).unwrap();
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();
        let out = dir.path().join("out.cobs_classic");
        build(&docs, &out, &dir.path().join("work"), &ClassicBuildParams::default()).unwrap();

        let mmap_file = ClassicSearchFile::open(&out, &Environment::default()).unwrap();
        let buffered_env = Environment {
            load_complete_index: true,
            ..Environment::default()
        };
        let buffered_file = ClassicSearchFile::open(&out, &buffered_env).unwrap();

        let row_bytes = mmap_file.row_bytes;
        let a = mmap_file.read_row_slice(0, 0, 0, row_bytes).unwrap();
        let b = buffered_file.read_row_slice(0, 0, 0, row_bytes).unwrap();
        assert_eq!(a, b);
    }
}
