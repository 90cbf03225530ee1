//! Index construction: the classic builder (batch → hierarchical combine)
//! and the compact builder (size-bucketed classic sub-indexes,
//! page-aligned concatenation).

pub mod classic;
pub mod compact;

use crate::error::{CobsError, Result};
use docsrc::{DocumentEntry, DocumentSource};
use rand::Rng;
use std::path::{Path, PathBuf};

/// `m = ⌈n* × ln(1 − fpr^(1/h)) / −h⌉`, the smallest signature size giving
/// the target false-positive rate for the largest document in the batch
/// (spec.md §4.6).
pub fn signature_size_for_fpr(n_star: u64, h: u64, fpr: f64) -> u64 {
    if n_star == 0 {
        return 8;
    }
    let h = h as f64;
    let inner = 1.0 - fpr.powf(1.0 / h);
    let m = (n_star as f64) * inner.ln() / -h;
    m.ceil().max(8.0) as u64
}

/// Checks an output path against `clobber`/`continue_` policy (spec.md
/// §7, usage error: "output exists without clobber or continue").
pub fn check_output_path(path: &Path, clobber: bool, continue_: bool) -> Result<()> {
    if path.exists() && !clobber && !continue_ {
        return Err(CobsError::usage(format!(
            "output {path:?} already exists; pass clobber or continue"
        )));
    }
    Ok(())
}

/// Synthetic document generator used for seed tests and benchmarks: a
/// random `length`-base sequence, with document `j` keeping every `j`-th
/// k-mer (duplicated `dup_count` times), written out as raw-text document
/// files under `dir` (spec.md §8 scenario 1 "all-included").
pub fn construct_random(
    dir: &Path,
    num_docs: usize,
    length: usize,
    k: usize,
    dup_count: impl Fn(usize) -> usize,
    rng: &mut impl Rng,
) -> Result<(Vec<PathBuf>, Vec<u8>)> {
    std::fs::create_dir_all(dir).map_err(CobsError::Io)?;

    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    let query: Vec<u8> = (0..length).map(|_| BASES[rng.gen_range(0..4)]).collect();

    let mut paths = Vec::with_capacity(num_docs);
    for j in 0..num_docs {
        let path = dir.join(format!("doc_{j:04}.txt"));
        let mut contents = Vec::new();
        let step = j.max(1);
        let mut i = 0;
        while i + k <= query.len() {
            for _ in 0..dup_count(j) {
                contents.extend_from_slice(&query[i..i + k]);
                contents.push(b'\n');
            }
            i += step;
        }
        std::fs::write(&path, &contents).map_err(CobsError::Io)?;
        paths.push(path);
    }
    Ok((paths, query))
}

/// Fills in `term_count` for documents already discovered by
/// [`docsrc::scan_documents`]. Takes already-expanded entries (one per
/// multi-FASTA record, `subdoc_index` included) rather than bare paths,
/// so a record's own `subdoc_index` survives into the producer that
/// computes its term count (spec.md §3.2, §4.3).
pub fn load_document_entries(entries: Vec<DocumentEntry>, term_size: usize) -> Result<Vec<DocumentEntry>> {
    entries
        .into_iter()
        .map(|mut entry| {
            entry.term_count = DocumentSource::from_entry(&entry).num_terms(term_size)?;
            Ok(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_size_grows_with_term_count() {
        let small = signature_size_for_fpr(100, 3, 0.1);
        let large = signature_size_for_fpr(100_000, 3, 0.1);
        assert!(large > small);
    }

    #[test]
    fn check_output_path_rejects_existing_without_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cobs_classic");
        std::fs::write(&path, b"x").unwrap();
        assert!(check_output_path(&path, false, false).is_err());
        assert!(check_output_path(&path, true, false).is_ok());
        assert!(check_output_path(&path, false, true).is_ok());
    }
}
