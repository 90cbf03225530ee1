//! End-to-end scenarios run against the public API, independent of the
//! unit tests living next to their components.

use cobs::build::classic::{build, ClassicBuildParams};
use cobs::build::{construct_random, load_document_entries};
use cobs::env::Environment;
use cobs::query::{query, QueryOptions};
use cobs::search::IndexFile;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

#[test]
fn no_false_negatives_for_every_term_in_every_document() {
    let dir = tempdir().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(101);
    let docs_dir = dir.path().join("docs");
    let (_paths, query_seq) = construct_random(&docs_dir, 10, 5_000, 31, |_| 1, &mut rng).unwrap();
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

    // Document j keeps every j-th (j.max(1)) 31-mer of the shared query;
    // every term it keeps must score >= 1 when queried on its own.
    for (j, _) in docs.iter().enumerate() {
        let step = j.max(1);
        let mut i = 0;
        while i + 31 <= query_seq.len() {
            let term = &query_seq[i..i + 31];
            let hits = query(&index, term, &QueryOptions::default()).unwrap();
            let doc_name = &docs[j].name;
            let hit = hits.iter().find(|h| &h.name == doc_name);
            assert!(hit.is_some(), "term at offset {i} missing from document {j}");
            assert!(hit.unwrap().score >= 1);
            i += step;
        }
    }
}

#[test]
fn scores_are_bounded_by_query_length() {
    let dir = tempdir().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(202);
    let docs_dir = dir.path().join("docs");
    let (_paths, query_seq) = construct_random(&docs_dir, 20, 2_000, 31, |_| 1, &mut rng).unwrap();
    let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
    let docs = load_document_entries(entries, 31).unwrap();

    let out = dir.path().join("out.cobs_classic");
    build(&docs, &out, &dir.path().join("work"), &ClassicBuildParams::default()).unwrap();
    let index = IndexFile::open(&out, &Environment::default()).unwrap();

    let max_score = (query_seq.len() - 31 + 1) as u32;
    let hits = query(&index, &query_seq, &QueryOptions::default()).unwrap();
    for hit in hits {
        assert!(hit.score <= max_score);
    }
}

#[test]
fn false_positive_ceiling_over_ten_thousand_random_queries() {
    let dir = tempdir().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(303);
    let docs_dir = dir.path().join("docs");
    let (_paths, _query_seq) = construct_random(&docs_dir, 33, 50_000, 31, |_| 1, &mut rng).unwrap();
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

    let mut totals = vec![0u32; docs.len()];
    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    for _ in 0..10_000 {
        let random_query: Vec<u8> = (0..31).map(|_| BASES[rng.gen_range(0..4)]).collect();
        let hits = query(&index, &random_query, &QueryOptions::default()).unwrap();
        for hit in hits.into_iter().filter(|h| h.score > 0) {
            if let Some(idx) = docs.iter().position(|d| d.name == hit.name) {
                totals[idx] += 1;
            }
        }
    }

    for total in totals {
        assert!(total <= 1070, "false-positive count {total} exceeds ceiling");
    }
}
