use cobs::hash::{hashes_for, process_hashes, raw_hash};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn criterion_benchmark(c: &mut Criterion) {
    let term = b"ACGTACGTACGTACGTACGTACGTACGTACG";

    c.bench_function("raw_hash", |b| b.iter(|| raw_hash(black_box(term), black_box(0))));
    c.bench_function("process_hashes/h=3", |b| {
        b.iter(|| {
            let mut count = 0u64;
            process_hashes(black_box(term), 1 << 24, 3, |row| count ^= row);
            count
        })
    });
    c.bench_function("hashes_for/h=3", |b| b.iter(|| hashes_for(black_box(term), 1 << 24, 3)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
