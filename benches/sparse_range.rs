use capmap::{Range, SparseRange};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

fn random_ranges(count: usize, span: u64) -> Vec<Range> {
    let mut state = 0x9e37_79b9_7f4a_7c15_u64;
    (0..count)
        .map(|_| {
            let base = xorshift(&mut state) % span;
            let len = xorshift(&mut state) % 0x1000 + 1;
            Range::from_base_length(base, len)
        })
        .collect()
}

fn combined(ranges: &[Range]) -> SparseRange {
    let mut s = SparseRange::new();
    for r in ranges {
        s.combine(*r);
    }
    s
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let ranges = random_ranges(1024, 1 << 32);
    let populated = combined(&ranges);

    let mut group = c.benchmark_group("SparseRange");
    group.bench_function("combine 1024 random", |b| {
        b.iter(|| combined(black_box(&ranges)))
    });
    group.bench_function("remove 1024 random", |b| {
        b.iter(|| {
            let mut s = populated.clone();
            for r in &ranges {
                s.remove(black_box(*r));
            }
            s
        })
    });
    group.bench_function("includes probe", |b| {
        b.iter(|| {
            let mut hits = 0_u32;
            for r in &ranges {
                if populated.includes(black_box(*r)) {
                    hits += 1;
                }
            }
            hits
        })
    });
    group.bench_function("complement", |b| b.iter(|| black_box(&populated).complement()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
