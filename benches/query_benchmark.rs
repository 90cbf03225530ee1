use cobs::build::classic::{build, ClassicBuildParams};
use cobs::build::{construct_random, load_document_entries};
use cobs::env::Environment;
use cobs::query::{query, QueryOptions};
use cobs::search::IndexFile;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;

fn criterion_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let docs_dir = dir.path().join("docs");
    let (_paths, query_seq) = construct_random(&docs_dir, 64, 20_000, 31, |_| 1, &mut rng).unwrap();
    let entries = docsrc::scan_documents(&docs_dir, docsrc::FileType::Any, 31).unwrap();
    let docs = load_document_entries(entries, 31).unwrap();

    let out = dir.path().join("bench.cobs_classic");
    build(&docs, &out, &dir.path().join("work"), &ClassicBuildParams::default()).unwrap();
    let index = IndexFile::open(&out, &Environment::default()).unwrap();
    let opts = QueryOptions::default();

    c.bench_function("query/64-docs", |b| {
        b.iter(|| query(black_box(&index), black_box(&query_seq), black_box(&opts)).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
