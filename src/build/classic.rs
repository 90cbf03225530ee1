//! Classic builder: batch sizing into an iteration directory, then
//! hierarchical row-wise combine down to a single output file
//! (spec.md §4.6).

use super::{check_output_path, signature_size_for_fpr};
use crate::bitmap::build_from_batch;
use crate::error::{CobsError, Result};
use crate::format::classic::{self, ClassicHeader};
use docsrc::{DocumentEntry, DocumentSource};
use std::fs;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ClassicBuildParams {
    pub k: usize,
    pub canonical: bool,
    pub num_hashes: u64,
    pub false_positive_rate: f64,
    /// Forces a specific signature size instead of deriving it from the
    /// batch's largest document.
    pub signature_size: Option<u64>,
    pub mem_budget_bytes: u64,
    pub clobber: bool,
    pub continue_: bool,
}

impl Default for ClassicBuildParams {
    fn default() -> Self {
        Self {
            k: 31,
            canonical: true,
            num_hashes: 3,
            false_positive_rate: 0.01,
            signature_size: None,
            mem_budget_bytes: 256 * 1024 * 1024,
            clobber: false,
            continue_: false,
        }
    }
}

/// Builds a classic index from `docs` into `out_path`, using `work_dir`
/// for the iteration directories.
pub fn build(
    docs: &[DocumentEntry],
    out_path: &Path,
    work_dir: &Path,
    params: &ClassicBuildParams,
) -> Result<()> {
    if docs.is_empty() {
        return Err(CobsError::usage("document list is empty"));
    }
    check_output_path(out_path, params.clobber, params.continue_)?;
    fs::create_dir_all(work_dir).map_err(CobsError::Io)?;

    let n_star = docs.iter().map(|d| d.term_count.max(1)).max().unwrap_or(1);
    let m = params
        .signature_size
        .unwrap_or_else(|| signature_size_for_fpr(n_star, params.num_hashes, params.false_positive_rate));

    let iteration_0 = write_batches(docs, work_dir, m, params)?;
    let final_iteration = combine_until_single(&iteration_0, work_dir, params.mem_budget_bytes)?;

    fs::rename(&final_iteration, out_path).map_err(CobsError::Io)?;
    Ok(())
}

fn iteration_dir(work_dir: &Path, iteration: usize) -> PathBuf {
    work_dir.join(format!("{iteration:07}"))
}

/// Batch sizing: partitions `docs` into groups of size `B` (a multiple of
/// 8) such that one partial bitmap `m × ⌈B/8⌉` fits `mem_budget_bytes`,
/// writing each batch as a sub-index into iteration directory `1/`
/// (spec.md §4.6 step 1).
fn write_batches(
    docs: &[DocumentEntry],
    work_dir: &Path,
    m: u64,
    params: &ClassicBuildParams,
) -> Result<Vec<PathBuf>> {
    let dir = iteration_dir(work_dir, 1);
    fs::create_dir_all(&dir).map_err(CobsError::Io)?;

    let max_batch = batch_size_for_budget(m, params.mem_budget_bytes);
    let mut outputs = Vec::new();
    let mut batch_no = 0usize;
    let mut start = 0usize;

    while start < docs.len() {
        let end = (start + max_batch).min(docs.len());
        let batch = &docs[start..end];
        let out = dir.join(format!("batch_{batch_no:06}.cobs_classic"));

        if params.continue_ && classic::is_complete(&out) {
            outputs.push(out);
            start = end;
            batch_no += 1;
            continue;
        }

        let sources: Vec<(DocumentSource, usize)> = batch
            .iter()
            .map(|e| (DocumentSource::from_entry(e), e.term_size))
            .collect();
        let bitmap = build_from_batch(&sources, params.canonical, m, params.num_hashes)?;

        let header = ClassicHeader {
            term_size: params.k as u32,
            canonical: params.canonical,
            sig_size: m,
            num_hashes: params.num_hashes,
            file_names: batch.iter().map(|e| e.name.clone()).collect(),
        };
        classic::write_classic_index(&out, &header, |r| Ok(bitmap.row(r).to_vec()))?;
        outputs.push(out);

        start = end;
        batch_no += 1;
    }
    Ok(outputs)
}

/// Largest multiple of 8 `B` such that `m × ⌈B/8⌉` bytes fit the budget.
fn batch_size_for_budget(m: u64, mem_budget_bytes: u64) -> usize {
    let max_row_bytes = (mem_budget_bytes / m.max(1)).max(1);
    ((max_row_bytes * 8) as usize).max(8)
}

/// Repeatedly combines sub-indexes in the current iteration directory
/// until exactly one remains, returning its path (spec.md §4.6 step 2).
fn combine_until_single(mut files: &[PathBuf], work_dir: &Path, mem_budget_bytes: u64) -> Result<PathBuf> {
    let mut owned;
    let mut iteration = 2usize;

    loop {
        if files.len() == 1 {
            return Ok(files[0].clone());
        }

        let dir = iteration_dir(work_dir, iteration);
        fs::create_dir_all(&dir).map_err(CobsError::Io)?;

        let headers: Vec<ClassicHeader> = files
            .iter()
            .map(|f| classic::read_header(f).map(|(h, _)| h))
            .collect::<Result<_>>()?;
        for pair in headers.windows(2) {
            if !pair[0].compatible_with(&pair[1]) {
                return Err(CobsError::format(
                    &files[0],
                    "sub-indexes disagree on (m, h, k, canonical)",
                ));
            }
        }

        let groups = group_by_budget(&headers, mem_budget_bytes);
        let mut next_files = Vec::with_capacity(groups.len());

        for (group_no, group) in groups.iter().enumerate() {
            let out = dir.join(format!("combined_{group_no:06}.cobs_classic"));
            combine_group(&files[group.clone()], &headers[group.clone()], &out)?;
            next_files.push(out);
        }

        for f in files {
            let _ = fs::remove_file(f);
        }

        owned = next_files;
        files = &owned;
        iteration += 1;
    }
}

/// Groups consecutive files so that each group's combined row width (in
/// bytes) fits the memory budget.
fn group_by_budget(headers: &[ClassicHeader], mem_budget_bytes: u64) -> Vec<std::ops::Range<usize>> {
    let m = headers[0].sig_size;
    let max_row_bytes = (mem_budget_bytes / m.max(1)).max(1);

    let mut groups = Vec::new();
    let mut start = 0usize;
    let mut acc = 0u64;
    for (i, h) in headers.iter().enumerate() {
        let rb = h.row_bytes();
        if acc + rb > max_row_bytes && i > start {
            groups.push(start..i);
            start = i;
            acc = 0;
        }
        acc += rb;
    }
    groups.push(start..headers.len());
    groups
}

/// Row-concatenates `sources` (already known-compatible) into `out`: row
/// `r` of the output is the byte-concatenation of row `r` of each source
/// in file order (spec.md §8 "row-concatenation identity").
fn combine_group(sources: &[PathBuf], headers: &[ClassicHeader], out: &Path) -> Result<()> {
    let m = headers[0].sig_size;
    let h = headers[0].num_hashes;
    let k = headers[0].term_size;
    let canonical = headers[0].canonical;

    let mut file_names = Vec::new();
    for hdr in headers {
        file_names.extend(hdr.file_names.iter().cloned());
    }

    let mut readers: Vec<(BufReader<fs::File>, u64)> = Vec::with_capacity(sources.len());
    for (path, hdr) in sources.iter().zip(headers) {
        let (_, payload_offset) = classic::read_header(path)?;
        let mut file = fs::File::open(path).map_err(CobsError::Io)?;
        file.seek(SeekFrom::Start(payload_offset)).map_err(CobsError::Io)?;
        readers.push((BufReader::new(file), hdr.row_bytes()));
    }

    let header = ClassicHeader {
        term_size: k,
        canonical,
        sig_size: m,
        num_hashes: h,
        file_names,
    };

    classic::write_classic_index(out, &header, |_r| {
        let mut row = Vec::with_capacity(header.row_bytes() as usize);
        for (reader, row_bytes) in readers.iter_mut() {
            let mut buf = vec![0u8; *row_bytes as usize];
            reader.read_exact(&mut buf)?;
            row.extend_from_slice(&buf);
        }
        Ok(row)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{construct_random, load_document_entries};
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn combine_equivalence_byte_for_byte() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let docs_dir = dir.path().join("docs");
        construct_random(&docs_dir, 8, 2000, 31, |_| 1, &mut rng).unwrap();
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();

        let params = ClassicBuildParams {
            signature_size: Some(4096),
            ..Default::default()
        };

        // Build two halves, combine them.
        let (half_a, half_b) = docs.split_at(4);
        let out_a = dir.path().join("a.cobs_classic");
        let out_b = dir.path().join("b.cobs_classic");
        build(half_a, &out_a, &dir.path().join("work_a"), &params).unwrap();
        build(half_b, &out_b, &dir.path().join("work_b"), &params).unwrap();

        let header_a = classic::read_header(&out_a).unwrap().0;
        let header_b = classic::read_header(&out_b).unwrap().0;
        let combined_out = dir.path().join("combined.cobs_classic");
        combine_group(&[out_a.clone(), out_b.clone()], &[header_a, header_b], &combined_out).unwrap();

        // Build the union directly, in the same order.
        let union_out = dir.path().join("union.cobs_classic");
        build(&docs, &union_out, &dir.path().join("work_union"), &params).unwrap();

        let combined_bytes = fs::read(&combined_out).unwrap();
        let union_bytes = fs::read(&union_out).unwrap();
        assert_eq!(combined_bytes, union_bytes);
    }

    #[test]
    fn batch_size_is_multiple_of_eight() {
        assert_eq!(batch_size_for_budget(1024, 1024 * 1024) % 8, 0);
    }
}
