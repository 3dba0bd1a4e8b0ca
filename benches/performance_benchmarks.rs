use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use measurement_engine::buffer::Buffer;

/// Benchmark appending to and draining a [`Buffer`] at a few representative
/// chunk sizes, the same shape of work the Transport's read path performs
/// every time a socket pump delivers a chunk.
fn bench_buffer_append_and_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_append_and_read");

    for size in [64usize, 8192, 64 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        let chunk = vec![0x41u8; *size];

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut buf = Buffer::new();
                buf.append(black_box(&chunk));
                black_box(buf.read(size).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark the CRLF line-scan `readline` performs — the hot path for
/// anything that frames messages on terminator bytes rather than a
/// length prefix.
fn bench_buffer_readline(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_readline");

    for line_len in [16usize, 256, 4096].iter() {
        let mut seed = vec![b'a'; *line_len];
        seed.extend_from_slice(b"\r\n");
        group.throughput(Throughput::Bytes(seed.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(line_len), &seed, |b, seed| {
            b.iter(|| {
                let mut buf = Buffer::new();
                buf.append(black_box(seed));
                black_box(buf.readline(seed.len()).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark filling an NDT C2S upload block with random printable ASCII,
/// the per-block cost that bounds how fast `test_c2s::upload_for` can push
/// data onto the wire.
fn bench_write_random_printable(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_random_printable");
    group.throughput(Throughput::Bytes(8192));

    group.bench_function("8192_byte_block", |b| {
        b.iter(|| {
            let mut buf = Buffer::new();
            buf.write_random_printable(black_box(8192));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_buffer_append_and_read,
    bench_buffer_readline,
    bench_write_random_printable
);
criterion_main!(benches);
