//! Query engine: a sequence becomes hashes, hashes become per-document
//! scores via row AND-ing and SIMD column popcount, and scores become a
//! ranked top-*N* list (spec.md §4.9).

use crate::error::{CobsError, Result};
use crate::hash::raw_hash;
use crate::kmer::canonical_form;
use crate::search::SearchFile;
use crate::simd::expand_add_row;
use rayon::prelude::*;

const MAX_QUERY_EXCESS: usize = 1 << 16;

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Minimum fraction of query k-mers that must be present.
    pub threshold: f64,
    /// `0` means "return every surviving document".
    pub limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { threshold: 0.0, limit: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub score: u32,
    pub name: String,
}

/// Queries one index.
pub fn query(index: &dyn SearchFile, query_seq: &[u8], opts: &QueryOptions) -> Result<Vec<Hit>> {
    query_multi(&[index], query_seq, opts)
}

/// Queries several indexes at once and fuses their results, fixing block
/// order by the order indexes are passed in (spec.md §4.9 step 7,
/// §8 scenario 6 "multi-index fusion").
pub fn query_multi(indexes: &[&dyn SearchFile], query_seq: &[u8], opts: &QueryOptions) -> Result<Vec<Hit>> {
    // (block_id, column_id, score, name) before the final sort.
    let mut candidates: Vec<(usize, usize, u32, String)> = Vec::new();

    for (block_id, &index) in indexes.iter().enumerate() {
        let meta = index.metadata();
        let k = meta.term_size as usize;
        if query_seq.len() < k {
            return Err(CobsError::input(format!(
                "query of length {} is shorter than k={k}",
                query_seq.len()
            )));
        }
        let num_terms = query_seq.len() - k + 1;
        if num_terms >= MAX_QUERY_EXCESS {
            return Err(CobsError::input(format!(
                "query too long: |Q| - k must be < 2^16, got {num_terms}"
            )));
        }

        let per_block_scores = accumulate_scores(index, query_seq, k, num_terms)?;
        let doc_counts = meta.block_doc_counts();
        let int_threshold = (opts.threshold * num_terms as f64).ceil() as u32;

        let mut col_base = 0usize;
        for (p, &count) in doc_counts.iter().enumerate() {
            for col in 0..count as usize {
                let score = per_block_scores[p][col] as u32;
                if score >= int_threshold {
                    candidates.push((block_id, col_base + col, score, meta.file_names[col_base + col].clone()));
                }
            }
            col_base += count as usize;
        }
    }

    // Descending score, ascending (block_id, column_id) as tie-break
    // (spec.md §4.9 step 7).
    candidates.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));

    let limited = if opts.limit == 0 {
        candidates
    } else {
        candidates.into_iter().take(opts.limit).collect()
    };
    Ok(limited.into_iter().map(|(_, _, score, name)| Hit { score, name }).collect())
}

/// Slides a `k`-window over `query_seq`, hashes and row-ANDs each term
/// against every parameter block, and expand-adds the result into a
/// per-block score array sized to that block's full bit width (including
/// any padding columns, which never score). Parallel across term
/// batches with an elementwise-sum reduction (spec.md §4.9 steps 1-5,
/// §5 "steps 3-5 are parallel across score batches").
fn accumulate_scores(index: &dyn SearchFile, query_seq: &[u8], k: usize, num_terms: usize) -> Result<Vec<Vec<u16>>> {
    let meta = index.metadata();
    let canonical = meta.canonical;
    let blocks = meta.blocks.clone();
    let num_blocks = blocks.len();
    let rb = meta.page_size;
    let max_hashes = blocks.iter().map(|&(_, h)| h).max().unwrap_or(0);

    let zero_scores = || -> Vec<Vec<u16>> { blocks.iter().map(|_| vec![0u16; rb as usize * 8]).collect() };

    let chunk_count = rayon::current_num_threads().max(1);
    let chunk_size = (num_terms + chunk_count - 1) / chunk_count;

    let partials: Vec<Result<Vec<Vec<u16>>>> = (0..num_terms)
        .collect::<Vec<_>>()
        .par_chunks(chunk_size.max(1))
        .map(|term_indices| -> Result<Vec<Vec<u16>>> {
            let mut scores = zero_scores();
            let mut row_buf = vec![0u8; max_hashes as usize * num_blocks * rb as usize];
            for &i in term_indices {
                let window = &query_seq[i..i + k];
                let canon = canonical_form(window, canonical)?;
                let hashes: Vec<u64> = (0..max_hashes).map(|seed| raw_hash(&canon, seed)).collect();
                index.read_rows(&hashes, &mut row_buf, 0, rb, rb)?;

                for (p, &(_, num_hashes)) in blocks.iter().enumerate() {
                    let mut combined: Option<Vec<u8>> = None;
                    for seed in 0..num_hashes as usize {
                        let row_idx = seed * num_blocks + p;
                        let start = row_idx * rb as usize;
                        let row = &row_buf[start..start + rb as usize];
                        combined = Some(match combined {
                            None => row.to_vec(),
                            Some(mut acc) => {
                                for (a, &b) in acc.iter_mut().zip(row.iter()) {
                                    *a &= b;
                                }
                                acc
                            }
                        });
                    }
                    if let Some(row) = combined {
                        expand_add_row(&mut scores[p], &row);
                    }
                }
            }
            Ok(scores)
        })
        .collect();

    let mut total = zero_scores();
    for partial in partials {
        let partial = partial?;
        for (p, block_scores) in partial.into_iter().enumerate() {
            for (t, v) in total[p].iter_mut().zip(block_scores.into_iter()) {
                *t += v;
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::classic::{build, ClassicBuildParams};
    use crate::build::{construct_random, load_document_entries};
    use crate::env::Environment;
    use crate::search::IndexFile;
    use rand::SeedableRng;
    use tempfile::tempdir;

    #[test]
    fn all_included_build_scores_every_document() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let docs_dir = dir.path().join("docs");
        let (_paths, query_seq) = construct_random(&docs_dir, 33, 50_000, 31, |_| 1, &mut rng).unwrap();
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();
        let out = dir.path().join("out.cobs_classic");
        let params = ClassicBuildParams {
            num_hashes: 3,
            false_positive_rate: 0.1,
            ..Default::default()
        };
        build(&docs, &out, &dir.path().join("work"), &params).unwrap();

        let index = IndexFile::open(&out, &Environment::default()).unwrap();
        let hits = query(&index, &query_seq, &QueryOptions::default()).unwrap();
        assert_eq!(hits.len(), 33);
        for (j, doc) in docs.iter().enumerate() {
            let hit = hits.iter().find(|h| h.name == doc.name).unwrap();
            assert!(hit.score as u64 >= doc.term_count);
        }
    }

    #[test]
    fn singleton_build_scores_exactly_one() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let query_seq: Vec<u8> = {
            let (_, q) = construct_random(&dir.path().join("seed"), 1, 31, 31, |_| 1, &mut rng).unwrap();
            q
        };

        // Each document holds `10*j + 1` copies of the same single k-mer,
        // matching the "singleton" seed scenario's duplicate counts.
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        for j in 0..33usize {
            let path = docs_dir.join(format!("doc_{j:04}.txt"));
            let line = format!("{}\n", String::from_utf8_lossy(&query_seq));
            std::fs::write(&path, line.repeat(10 * j + 1)).unwrap();
        }
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();

        let out = dir.path().join("out.cobs_classic");
        let params = ClassicBuildParams {
            num_hashes: 3,
            false_positive_rate: 0.1,
            ..Default::default()
        };
        build(&docs, &out, &dir.path().join("work"), &params).unwrap();

        let index = IndexFile::open(&out, &Environment::default()).unwrap();
        let opts = QueryOptions::default();
        let hits = query(&index, &query_seq, &opts).unwrap();
        assert_eq!(hits.len(), 33);
        for hit in &hits {
            assert_eq!(hit.score, 1);
        }
    }

    #[test]
    fn rejects_query_shorter_than_k() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let docs_dir = dir.path().join("docs");
        construct_random(&docs_dir, 2, 200, 31, |_| 1, &mut rng).unwrap();
        let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
        let docs = load_document_entries(entries, 31).unwrap();
        let out = dir.path().join("out.cobs_classic");
        build(&docs, &out, &dir.path().join("work"), &ClassicBuildParams::default()).unwrap();

        let index = IndexFile::open(&out, &Environment::default()).unwrap();
        let err = query(&index, b"ACGT", &QueryOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn multi_index_fusion_sums_to_combined_result_count() {
        let dir = tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let query_seq: Vec<u8> = {
            let (_, q) = construct_random(&dir.path().join("seed"), 1, 31, 31, |_| 1, &mut rng).unwrap();
            q
        };

        let write_singletons = |sub: &str, count: usize| -> std::path::PathBuf {
            let sub_dir = dir.path().join(sub);
            std::fs::create_dir_all(&sub_dir).unwrap();
            for j in 0..count {
                let path = sub_dir.join(format!("doc_{j:04}.txt"));
                std::fs::write(&path, format!("{}\n", String::from_utf8_lossy(&query_seq))).unwrap();
            }
            sub_dir
        };

        let sizes = [33usize, 44, 55];
        let params = ClassicBuildParams {
            num_hashes: 3,
            false_positive_rate: 0.1,
            ..Default::default()
        };

        let mut outs = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            let sub_dir = write_singletons(&format!("set_{i}"), size);
            let entries = docsrc::scan_documents(&sub_dir, docsrc::FileType::Any, 31).unwrap();
            let docs = load_document_entries(entries, 31).unwrap();
            let out = dir.path().join(format!("index_{i}.cobs_classic"));
            build(&docs, &out, &dir.path().join(format!("work_{i}")), &params).unwrap();
            outs.push(out);
        }

        let indexes: Vec<_> = outs
            .iter()
            .map(|p| IndexFile::open(p, &Environment::default()).unwrap())
            .collect();
        let refs: Vec<&dyn crate::search::SearchFile> = indexes.iter().map(|i| i as &dyn crate::search::SearchFile).collect();

        let opts = QueryOptions::default();
        let hits = query_multi(&refs, &query_seq, &opts).unwrap();
        assert_eq!(hits.len(), 33 + 44 + 55);
        for hit in &hits {
            assert_eq!(hit.score, 1);
        }
    }
}
