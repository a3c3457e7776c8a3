//! Criterion benchmarks for optimizing, compiling and running computation trees.
//!
//! Three axes:
//!
//! - **Optimize** - the inline-or-isolate pass over trees of growing depth
//! - **Compile** - scope construction, kernel rendering and lowering
//! - **Evaluate** - host execution of compiled kernels at varying sizes
//!
//! Run with: `cargo bench -p tessera-core -- compile/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tessera_core::{
    CollectionProducer, Evaluable, MapOp, OptimizationPolicy, PackedCollection, ParallelProcess,
    Producer, Shape,
};

const SIZES: &[usize] = &[64, 1024, 16384];
const DEPTHS: &[usize] = &[4, 16, 64];

// ---------------------------------------------------------------------------
// Tree builders
// ---------------------------------------------------------------------------

/// Alternating map/add chain of the given depth over one argument.
fn chain(len: usize, depth: usize) -> CollectionProducer {
    let x = CollectionProducer::argument(0, Shape::vector(len));
    let mut node = x.clone();
    for i in 0..depth {
        node = if i % 2 == 0 {
            node.map(MapOp::Sin)
        } else {
            node.add(&x).expect("matching shapes")
        };
    }
    node
}

fn input(len: usize) -> PackedCollection {
    let values: Vec<f64> = (0..len).map(|i| (i as f64 * 0.01).sin()).collect();
    PackedCollection::from_slice(&values)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/optimize");
    let policy = OptimizationPolicy::default();
    for &depth in DEPTHS {
        let tree = chain(1 << 18, depth).dot(&chain(1 << 18, depth)).expect("dot");
        group.bench_with_input(BenchmarkId::from_parameter(depth), &tree, |b, tree| {
            b.iter(|| black_box(tree.optimized(&policy).expect("optimize")));
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/kernel");
    for &depth in DEPTHS {
        let tree = chain(256, depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &tree, |b, tree| {
            b.iter(|| {
                let fresh = tree.with_options(*tree.options());
                black_box(fresh.get().expect("compile"))
            });
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/evaluate");
    for &len in SIZES {
        let tree = chain(len, 8).sum();
        let evaluable = tree.get().expect("compile");
        let args = [input(len)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &args, |b, args| {
            b.iter(|| black_box(evaluable.evaluate(args).expect("evaluate")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize, bench_compile, bench_evaluate);
criterion_main!(benches);
