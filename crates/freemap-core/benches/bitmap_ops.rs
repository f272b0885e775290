//! Benchmark: bulk range operations vs bit-at-a-time loops.
//!
//! Uses a fragmented 32k-bit bitmap (~5% clear bits punched in clusters),
//! the shape a block allocator sees on an aging filesystem.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use freemap_core::HeapBitmap;

const BITS: usize = 32_768;

fn fragmented_bitmap() -> HeapBitmap {
    let mut bm = HeapBitmap::default();
    bm.reset(BITS).unwrap();
    bm.set(0, BITS).unwrap();
    // Punch a 32-bit hole every ~650 bits (≈5% clear).
    let mut pos = 100;
    while pos + 32 < BITS {
        bm.clear(pos, pos + 32).unwrap();
        pos += 650;
    }
    bm
}

fn bench_range_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_set");

    group.bench_function("bulk", |b| {
        let mut bm = HeapBitmap::default();
        bm.reset(BITS).unwrap();
        b.iter(|| {
            bm.clear_all();
            bm.set(black_box(3), black_box(BITS - 5)).unwrap();
        });
    });

    group.bench_function("bit_at_a_time", |b| {
        let mut bm = HeapBitmap::default();
        bm.reset(BITS).unwrap();
        b.iter(|| {
            bm.clear_all();
            for bit in 3..BITS - 5 {
                bm.set_one(black_box(bit)).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let bm = fragmented_bitmap();
    c.bench_function("scan_set_run", |b| {
        b.iter(|| black_box(bm.scan(black_box(132), BITS, true)));
    });
}

fn bench_find(c: &mut Criterion) {
    let bm = fragmented_bitmap();
    c.bench_function("find_clear_run", |b| {
        b.iter(|| {
            let mut start = 0;
            let _ = black_box(bm.find(false, black_box(0), BITS, 32, &mut start));
            black_box(start)
        });
    });
}

fn bench_count(c: &mut Criterion) {
    let bm = fragmented_bitmap();
    c.bench_function("count_clear", |b| {
        b.iter(|| black_box(bm.count(black_box(0), BITS, false)));
    });
}

criterion_group!(benches, bench_range_set, bench_scan, bench_find, bench_count);
criterion_main!(benches);
