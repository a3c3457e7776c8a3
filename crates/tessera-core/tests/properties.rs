//! Property-based tests for tessera-core.
//!
//! Checks the optimizer and evaluation invariants over randomized trees and
//! inputs: optimization preserves results and is idempotent, isolation is
//! invisible to the result, shared inputs run once per evaluation, fixed
//! evaluables ignore their arguments, and the isolation decision respects its
//! first rule.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tessera_core::{
    CollectionProducer, Evaluable, FixedEvaluable, FnProducer, MapOp, OptimizationPolicy,
    PackedCollection, ParallelProcess, ParallelProcessContext, ParallelismSettings, Process,
    Parent, Producer, ProducerRef, Shape, Tree, isolation_decision,
};

const MAPS: [MapOp; 4] = [MapOp::Negate, MapOp::Abs, MapOp::Sin, MapOp::Cos];

/// `map(x * k) + x`, with a reduction on top when `reduce` is set.
fn build(len: usize, op: usize, k: f64, reduce: bool) -> CollectionProducer {
    let x = CollectionProducer::argument(0, Shape::vector(len));
    let scaled = x.multiply(&CollectionProducer::scalar(k)).unwrap();
    let y = scaled.map(MAPS[op % MAPS.len()]).add(&x).unwrap();
    if reduce { y.sum() } else { y }
}

/// A dynamic node that counts how often it is evaluated.
fn counted(values: Vec<f64>, calls: &Arc<AtomicUsize>) -> CollectionProducer {
    let calls = Arc::clone(calls);
    let shape = Shape::vector(values.len());
    let producer: ProducerRef<PackedCollection> =
        Arc::new(FnProducer::new(move |_: &[PackedCollection]| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(PackedCollection::from_slice(&values))
        }));
    CollectionProducer::dynamic("counted", shape, producer)
}

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-9 * (1.0 + x.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Optimizing never changes what a tree computes, and a second pass
    /// produces the same structure as the first.
    #[test]
    fn optimization_preserves_results(
        values in prop::collection::vec(-10.0f64..10.0, 1..48),
        op in 0usize..4,
        k in -3.0f64..3.0,
        reduce in any::<bool>(),
    ) {
        let tree = build(values.len(), op, k, reduce);
        let input = [PackedCollection::from_slice(&values)];
        let policy = OptimizationPolicy::default();

        let expected = tree.evaluate(&input).unwrap().to_vec();
        let once = tree.optimized(&policy).unwrap();
        let twice = once.optimized(&policy).unwrap();

        prop_assert!(close(&once.evaluate(&input).unwrap().to_vec(), &expected));
        prop_assert_eq!(once.tree_depth(), twice.tree_depth());
        prop_assert_eq!(
            once.all().iter().filter(|n| n.is_isolated()).count(),
            twice.all().iter().filter(|n| n.is_isolated()).count()
        );
    }

    /// Isolating any node of a tree leaves the root's result unchanged.
    #[test]
    fn isolation_is_transparent(
        values in prop::collection::vec(-5.0f64..5.0, 1..32),
        op in 0usize..4,
        k in -2.0f64..2.0,
    ) {
        let tree = build(values.len(), op, k, false);
        let input = [PackedCollection::from_slice(&values)];
        let expected = tree.evaluate(&input).unwrap().to_vec();

        let isolated_root = tree.isolate();
        prop_assert!(close(&isolated_root.evaluate(&input).unwrap().to_vec(), &expected));

        let isolated_children = tree.generate(tree.children().iter().map(Process::isolate).collect());
        prop_assert!(close(&isolated_children.evaluate(&input).unwrap().to_vec(), &expected));
    }

    /// However a shared input is spread over isolated branches, and whether
    /// or not the tree is optimized, one evaluation runs it once.
    #[test]
    fn shared_input_runs_once_per_evaluation(
        values in prop::collection::vec(-4.0f64..4.0, 1..24),
        ops in prop::collection::vec(0usize..4, 2..5),
        isolate in prop::collection::vec(any::<bool>(), 5),
        reduce in any::<bool>(),
        optimize in any::<bool>(),
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = counted(values, &calls);
        let source = if reduce { shared.sum() } else { shared };

        let mut tree = source.clone();
        for (i, &op) in ops.iter().enumerate() {
            let branch = source.map(MAPS[op]);
            let branch = if isolate[i] { branch.isolate() } else { branch };
            tree = tree.add(&branch).unwrap();
        }
        let tree = if optimize {
            tree.optimized(&OptimizationPolicy::default()).unwrap()
        } else {
            tree
        };

        let evaluable = tree.get().unwrap();
        evaluable.evaluate(&[]).unwrap();
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        evaluable.evaluate(&[]).unwrap();
        prop_assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// A fixed evaluable returns its value for any arguments.
    #[test]
    fn fixed_evaluable_ignores_arguments(
        value in -1.0e6f64..1.0e6,
        args in prop::collection::vec(prop::collection::vec(-1.0f64..1.0, 0..8), 0..4),
    ) {
        let fixed = FixedEvaluable::new(value);
        let args: Vec<PackedCollection> =
            args.iter().map(|a| PackedCollection::from_slice(a)).collect();
        prop_assert_eq!(fixed.evaluate(&args).unwrap(), value);
        prop_assert_eq!(fixed.call().unwrap(), value);
    }

    /// Children whose counts all equal the node's own count stay inline.
    #[test]
    fn matching_counts_never_isolate(
        own in 1u64..(1 << 24),
        children in 1usize..6,
    ) {
        let counts = vec![own; children];
        let ctx = ParallelProcessContext::base();
        let decision = isolation_decision(own, &ctx, &counts, &ParallelismSettings::default());
        prop_assert!(decision.is_inline());
    }
}
