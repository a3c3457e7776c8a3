//! Computation descriptions.

use std::sync::Arc;

use crate::collect::PackedCollection;
use crate::error::{Error, Result};

use super::evaluable::{Evaluable, FixedEvaluable, FnEvaluable};

/// Shared handle to an evaluable.
pub type EvaluableRef<T> = Arc<dyn Evaluable<T>>;

/// Shared handle to a producer.
pub type ProducerRef<T> = Arc<dyn Producer<T>>;

/// Immutable description of a computation yielding `T`.
///
/// A producer is not itself executable. [`get`](Producer::get) compiles it
/// (or returns a cached compilation) into an [`Evaluable`]. Transformations
/// build new producers rather than mutating existing ones, and identity is by
/// reference: two structurally equal producers are still distinct nodes.
pub trait Producer<T>: Send + Sync {
    /// Compiles the description.
    ///
    /// Repeated calls may return the same evaluable or a fresh one, but the
    /// results must be observably equivalent.
    fn get(&self) -> Result<EvaluableRef<T>>;

    /// Shorthand for `get()?.evaluate(args)`.
    fn evaluate(&self, args: &[PackedCollection]) -> Result<T> {
        self.get()?.evaluate(args)
    }

    /// Compiles the description so that results are written into `destination`.
    fn into_destination(&self, destination: T) -> Result<EvaluableRef<T>> {
        let _ = destination;
        Err(Error::unsupported("into_destination on a producer without in-place output"))
    }

    /// Releases cached compilations and buffers. The producer may be reused.
    fn destroy(&self) {}
}

/// Producer whose evaluable always yields the same value.
#[derive(Debug, Clone)]
pub struct ConstantProducer<T> {
    value: T,
}

impl<T: Clone + Send + Sync + 'static> ConstantProducer<T> {
    /// Wraps a value.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for ConstantProducer<T> {
    fn get(&self) -> Result<EvaluableRef<T>> {
        Ok(Arc::new(FixedEvaluable::new(self.value.clone())))
    }
}

/// Producer backed by a closure evaluated on every call.
pub struct FnProducer<T> {
    function: Arc<dyn Fn(&[PackedCollection]) -> Result<T> + Send + Sync>,
}

impl<T: 'static> FnProducer<T> {
    /// Wraps `function`.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&[PackedCollection]) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }
}

impl<T: 'static> Clone for FnProducer<T> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
        }
    }
}

impl<T: 'static> Producer<T> for FnProducer<T> {
    fn get(&self) -> Result<EvaluableRef<T>> {
        let function = Arc::clone(&self.function);
        Ok(Arc::new(FnEvaluable::new(move |args: &[PackedCollection]| {
            function(args)
        })))
    }
}
