//! Benchmarks for the rail solver and virtualization window.
//!
//! Run with: cargo bench -p railmap-layout

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use railmap_layout::{RailGeometry, VisibleRange, WindowDiff};
use std::hint::black_box;

/// Item offsets with a mildly clustered distribution, like a chat pane
/// with alternating short and long turns.
fn make_offsets(n: usize) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(n);
    let mut y = 0.0;
    for i in 0..n {
        offsets.push(y);
        y += if i % 7 == 0 { 900.0 } else { 60.0 };
    }
    offsets
}

fn bench_rail_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("rail/solve");
    let geom = RailGeometry::new(600.0);

    for n in [10, 100, 1000, 5000] {
        let offsets = make_offsets(n);
        group.bench_with_input(BenchmarkId::new("solve", n), &offsets, |b, offsets| {
            b.iter(|| black_box(geom.solve(offsets)))
        });
    }

    group.finish();
}

fn bench_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("rail/window");
    let geom = RailGeometry::new(600.0);

    for n in [1000, 10_000] {
        let layout = geom.solve(&make_offsets(n));
        let mid = layout.content_height / 2.0;
        group.bench_with_input(
            BenchmarkId::new("compute+diff", n),
            &layout.y_positions,
            |b, y| {
                b.iter(|| {
                    let prev = VisibleRange::compute(y, mid, 600.0, 200.0);
                    let next = VisibleRange::compute(y, mid + 80.0, 600.0, 200.0);
                    black_box(WindowDiff::between(prev, next))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rail_solve, bench_window);
criterion_main!(benches);
