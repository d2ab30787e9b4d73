use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate_encoder::{deflate, DeflateOptions};

fn sample_text(len: usize) -> Vec<u8> {
    "Pack my box with five dozen liquor jugs. How vexingly quick daft zebras jump! "
        .bytes()
        .cycle()
        .take(len)
        .collect()
}

fn bench_deflate(c: &mut Criterion) {
    let mut group = c.benchmark_group("deflate");
    for &size in &[4096usize, 65_536, 1_048_576] {
        let input = sample_text(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("single", size), &input, |b, input| {
            let options = DeflateOptions::default();
            b.iter(|| deflate(input, &options).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("threaded", size), &input, |b, input| {
            let options = DeflateOptions {
                threaded: true,
                ..Default::default()
            };
            b.iter(|| deflate(input, &options).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_deflate);
criterion_main!(benches);
