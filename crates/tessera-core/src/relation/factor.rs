//! Unary producer transformations.
//!
//! A [`Factor`] maps one producer to another of the same result type. `P` is
//! the producer handle being transformed, typically a
//! [`CollectionProducer`](crate::computation::CollectionProducer) or a
//! [`ProducerRef`](super::ProducerRef).

use std::sync::Arc;

use crate::error::{Error, Result};

/// Shared handle to a factor.
pub type FactorRef<P> = Arc<dyn Factor<P>>;

/// Maps a producer to a new producer, preserving its result type.
pub trait Factor<P>: Send + Sync {
    /// Applies the transformation.
    ///
    /// Must be a pure function of `value`.
    fn resultant(&self, value: &P) -> P;

    /// A factor applying `self` and then `next`.
    ///
    /// The base trait does not know how to compose itself; implementations
    /// that support chaining override this.
    fn and_then(&self, next: FactorRef<P>) -> Result<FactorRef<P>> {
        let _ = next;
        Err(Error::unsupported("and_then on a factor without composition support"))
    }
}

/// Sequential composition of two factors.
pub struct Chain<P> {
    first: FactorRef<P>,
    second: FactorRef<P>,
}

impl<P> Chain<P> {
    /// Applies `first`, then `second`.
    pub fn new(first: FactorRef<P>, second: FactorRef<P>) -> Self {
        Self { first, second }
    }
}

impl<P> Clone for Chain<P> {
    fn clone(&self) -> Self {
        Self {
            first: Arc::clone(&self.first),
            second: Arc::clone(&self.second),
        }
    }
}

impl<P: 'static> Factor<P> for Chain<P> {
    fn resultant(&self, value: &P) -> P {
        self.second.resultant(&self.first.resultant(value))
    }

    fn and_then(&self, next: FactorRef<P>) -> Result<FactorRef<P>> {
        Ok(Arc::new(Chain::new(Arc::new(self.clone()), next)))
    }
}

/// Factor backed by a closure.
pub struct FnFactor<P> {
    function: Arc<dyn Fn(&P) -> P + Send + Sync>,
}

impl<P> FnFactor<P> {
    /// Wraps `function`.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&P) -> P + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }
}

impl<P> Clone for FnFactor<P> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
        }
    }
}

impl<P: 'static> Factor<P> for FnFactor<P> {
    fn resultant(&self, value: &P) -> P {
        (self.function)(value)
    }

    fn and_then(&self, next: FactorRef<P>) -> Result<FactorRef<P>> {
        Ok(Arc::new(Chain::new(Arc::new(self.clone()), next)))
    }
}
