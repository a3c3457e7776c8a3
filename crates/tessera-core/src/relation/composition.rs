//! Binary producer combinators.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::collect::PackedCollection;
use crate::error::Result;

use super::evaluable::{Evaluable, FnEvaluable};
use super::factor::FactorRef;
use super::producer::{EvaluableRef, Producer, ProducerRef};

/// Shared handle to a composition.
pub type CompositionRef<P> = Arc<dyn Composition<P>>;

/// Merges two producers into one.
pub trait Composition<P>: Send + Sync {
    /// Combines `a` and `b` into a single producer node.
    ///
    /// The result must evaluate each operand once per evaluation of the
    /// composed producer.
    fn compose(&self, a: &P, b: &P) -> P;

    /// A composition that applies `next` to every composed result.
    fn and_then(self: Arc<Self>, next: FactorRef<P>) -> CompositionRef<P>
    where
        Self: Sized + 'static,
        P: 'static,
    {
        Arc::new(ComposeThen::new(self, next))
    }
}

/// A composition followed by a factor.
pub struct ComposeThen<P> {
    composition: CompositionRef<P>,
    factor: FactorRef<P>,
}

impl<P> ComposeThen<P> {
    /// Post-applies `factor` to the results of `composition`.
    pub fn new(composition: CompositionRef<P>, factor: FactorRef<P>) -> Self {
        Self {
            composition,
            factor,
        }
    }
}

impl<P: 'static> Composition<P> for ComposeThen<P> {
    fn compose(&self, a: &P, b: &P) -> P {
        self.factor.resultant(&self.composition.compose(a, b))
    }
}

/// Composition of opaque producers by a function of their results.
///
/// The composed producer compiles both operands and, per evaluation, runs
/// each exactly once before combining the values.
pub struct FnComposition<T> {
    combine: Arc<dyn Fn(T, T) -> Result<T> + Send + Sync>,
}

impl<T> FnComposition<T> {
    /// Combines operand results with `combine`.
    pub fn new<F>(combine: F) -> Self
    where
        F: Fn(T, T) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            combine: Arc::new(combine),
        }
    }
}

impl<T: Send + 'static> Composition<ProducerRef<T>> for FnComposition<T> {
    fn compose(&self, a: &ProducerRef<T>, b: &ProducerRef<T>) -> ProducerRef<T> {
        Arc::new(ComposedProducer {
            a: Arc::clone(a),
            b: Arc::clone(b),
            combine: Arc::clone(&self.combine),
            _marker: PhantomData,
        })
    }
}

struct ComposedProducer<T> {
    a: ProducerRef<T>,
    b: ProducerRef<T>,
    combine: Arc<dyn Fn(T, T) -> Result<T> + Send + Sync>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Producer<T> for ComposedProducer<T> {
    fn get(&self) -> Result<EvaluableRef<T>> {
        let a = self.a.get()?;
        let b = self.b.get()?;
        let combine = Arc::clone(&self.combine);
        Ok(Arc::new(FnEvaluable::new(move |args: &[PackedCollection]| {
            combine(a.evaluate(args)?, b.evaluate(args)?)
        })))
    }

    fn destroy(&self) {
        self.a.destroy();
        self.b.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{FnFactor, FnProducer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(value: f64, calls: &Arc<AtomicUsize>) -> ProducerRef<f64> {
        let calls = Arc::clone(calls);
        Arc::new(FnProducer::new(move |_: &[PackedCollection]| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }))
    }

    #[test]
    fn test_compose_evaluates_each_operand_once() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let a = counting(2.0, &a_calls);
        let b = counting(3.0, &b_calls);

        let sum = Arc::new(FnComposition::new(|x: f64, y: f64| Ok(x + y)));
        let triple: FactorRef<ProducerRef<f64>> =
            Arc::new(FnFactor::new(|p: &ProducerRef<f64>| -> ProducerRef<f64> {
                let p = Arc::clone(p);
                Arc::new(FnProducer::new(move |args: &[PackedCollection]| {
                    Ok(p.evaluate(args)? * 3.0)
                }))
            }));
        let composed = sum.and_then(triple).compose(&a, &b);

        assert_eq!(composed.evaluate(&[]).unwrap(), 15.0);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plain_compose_single_evaluation() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let product = FnComposition::new(|x: f64, y: f64| Ok(x * y));
        let composed = product.compose(&counting(4.0, &a_calls), &counting(5.0, &b_calls));
        assert_eq!(composed.get().unwrap().call().unwrap(), 20.0);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }
}
