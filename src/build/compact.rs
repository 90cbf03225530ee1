//! Compact builder: groups documents into fixed-size buckets by term
//! count, runs the classic builder (§4.6) on each bucket to get a
//! right-sized classic sub-index, then concatenates the sub-indexes into
//! a page-aligned compact index (spec.md §4.7).

use super::classic::{self as classic_builder, ClassicBuildParams};
use super::{check_output_path, signature_size_for_fpr};
use crate::error::{CobsError, Result};
use crate::format::classic as classic_format;
use crate::format::compact::{self, BlockParams, CompactHeader};
use docsrc::DocumentEntry;
use std::fs;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CompactBuildParams {
    pub k: usize,
    pub canonical: bool,
    pub num_hashes: u64,
    pub false_positive_rate: f64,
    pub page_size: u64,
    /// Passed through to the per-bucket classic builder, so a bucket
    /// whose working set exceeds the budget still streams through
    /// batches and a hierarchical combine instead of building in one
    /// in-memory pass.
    pub mem_budget_bytes: u64,
    pub clobber: bool,
    pub continue_: bool,
}

impl Default for CompactBuildParams {
    fn default() -> Self {
        Self {
            k: 31,
            canonical: true,
            num_hashes: 3,
            false_positive_rate: 0.01,
            page_size: 1 << 16,
            mem_budget_bytes: 256 * 1024 * 1024,
            clobber: false,
            continue_: false,
        }
    }
}

/// Builds a compact index from `docs` into `out_path`, using `work_dir`
/// as scratch space for each bucket's classic sub-index build.
pub fn build(docs: &[DocumentEntry], out_path: &Path, work_dir: &Path, params: &CompactBuildParams) -> Result<()> {
    if docs.is_empty() {
        return Err(CobsError::usage("document list is empty"));
    }
    if params.page_size == 0 {
        return Err(CobsError::usage("page size must be nonzero"));
    }
    check_output_path(out_path, params.clobber, params.continue_)?;
    fs::create_dir_all(work_dir).map_err(CobsError::Io)?;

    let mut sorted: Vec<&DocumentEntry> = docs.iter().collect();
    sorted.sort_by_key(|d| d.term_count);

    let bucket_size = (8 * params.page_size) as usize;
    let buckets: Vec<&[&DocumentEntry]> = sorted.chunks(bucket_size).collect();

    let mut block_params = Vec::with_capacity(buckets.len());
    let mut file_names = Vec::new();
    let mut bucket_files: Vec<PathBuf> = Vec::with_capacity(buckets.len());

    for (bucket_no, bucket) in buckets.iter().enumerate() {
        let bucket_docs: Vec<DocumentEntry> = bucket.iter().map(|&d| d.clone()).collect();
        let n_star = bucket_docs.iter().map(|d| d.term_count.max(1)).max().unwrap_or(1);
        let m_p = signature_size_for_fpr(n_star, params.num_hashes, params.false_positive_rate);

        let bucket_work_dir = work_dir.join(format!("bucket_{bucket_no:06}_work"));
        let bucket_out = work_dir.join(format!("bucket_{bucket_no:06}.cobs_classic"));
        let classic_params = ClassicBuildParams {
            k: params.k,
            canonical: params.canonical,
            num_hashes: params.num_hashes,
            false_positive_rate: params.false_positive_rate,
            signature_size: Some(m_p),
            mem_budget_bytes: params.mem_budget_bytes,
            clobber: true,
            continue_: params.continue_,
        };
        classic_builder::build(&bucket_docs, &bucket_out, &bucket_work_dir, &classic_params)?;

        for e in bucket.iter() {
            file_names.push(e.name.clone());
        }
        block_params.push(BlockParams {
            sig_size: m_p,
            num_hashes: params.num_hashes,
        });
        bucket_files.push(bucket_out);
    }

    let header = CompactHeader {
        term_size: params.k as u32,
        canonical: params.canonical,
        page_size: params.page_size,
        params: block_params,
        file_names,
    };

    let g = params.page_size as usize;
    let mut bucket_readers: Vec<(BufReader<fs::File>, u64)> = Vec::with_capacity(bucket_files.len());
    for path in &bucket_files {
        let (bucket_header, payload_offset) = classic_format::read_header(path)?;
        let mut file = fs::File::open(path).map_err(CobsError::Io)?;
        file.seek(SeekFrom::Start(payload_offset)).map_err(CobsError::Io)?;
        bucket_readers.push((BufReader::new(file), bucket_header.row_bytes()));
    }

    compact::write_compact_index(out_path, &header, |block, _row| {
        let (reader, row_bytes) = &mut bucket_readers[block];
        let mut buf = vec![0u8; *row_bytes as usize];
        reader.read_exact(&mut buf)?;
        let mut out = vec![0u8; g];
        out[..buf.len()].copy_from_slice(&buf);
        Ok(out)
    })?;

    for path in &bucket_files {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{construct_random, load_document_entries};
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn payload_is_page_aligned_and_blocks_are_page_sized() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let docs_dir = dir.path().join("docs");
        construct_random(&docs_dir, 200, 500, 31, |_| 1, &mut rng).unwrap();
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();

        let out = dir.path().join("out.cobs_compact");
        let params = CompactBuildParams {
            page_size: 16,
            ..Default::default()
        };
        build(&docs, &out, &dir.path().join("work"), &params).unwrap();

        let (header, payload_offset) = compact::read_header(&out).unwrap();
        assert_eq!(payload_offset % 16, 0);
        for p in 0..header.params.len() {
            assert_eq!(header.block_len(p) % 16, 0);
        }
        assert_eq!(header.file_names.len(), 200);
    }
}
