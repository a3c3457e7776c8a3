//! Executable computations.

use std::marker::PhantomData;

use crate::collect::PackedCollection;
use crate::error::{Error, Result};

/// A compiled, repeatedly invokable computation.
///
/// Arguments are positional substitutions for the inputs the computation
/// declared when it was described. Implementations must reject argument lists
/// that do not match their signature rather than ignore or truncate them.
pub trait Evaluable<T>: Send + Sync {
    /// Runs the computation with the given positional arguments.
    fn evaluate(&self, args: &[PackedCollection]) -> Result<T>;

    /// Runs the computation without arguments.
    ///
    /// Always equivalent to `evaluate(&[])`.
    fn call(&self) -> Result<T> {
        self.evaluate(&[])
    }

    /// Allocates a container for `size` results of this computation.
    fn create_destination(&self, size: usize) -> Result<Multiple<T>> {
        let _ = size;
        Err(Error::unsupported("create_destination on an evaluable without batch output"))
    }
}

/// Evaluable whose result never depends on its arguments.
///
/// Used for constants and providers: for any two argument lists
/// `evaluate(a1) == evaluate(a2) == get()`.
#[derive(Debug, Clone)]
pub struct FixedEvaluable<T> {
    value: T,
}

impl<T: Clone + Send + Sync> FixedEvaluable<T> {
    /// Wraps a fixed value.
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// The fixed value.
    pub fn get(&self) -> T {
        self.value.clone()
    }
}

impl<T: Clone + Send + Sync> Evaluable<T> for FixedEvaluable<T> {
    fn evaluate(&self, _args: &[PackedCollection]) -> Result<T> {
        Ok(self.value.clone())
    }
}

/// Evaluable backed by a closure.
pub struct FnEvaluable<T, F> {
    function: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> FnEvaluable<T, F>
where
    F: Fn(&[PackedCollection]) -> Result<T> + Send + Sync,
{
    /// Wraps `function`.
    pub fn new(function: F) -> Self {
        Self {
            function,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Evaluable<T> for FnEvaluable<T, F>
where
    F: Fn(&[PackedCollection]) -> Result<T> + Send + Sync,
{
    fn evaluate(&self, args: &[PackedCollection]) -> Result<T> {
        (self.function)(args)
    }
}

/// A batch of results produced by [`Evaluable::create_destination`].
#[derive(Debug, Clone, PartialEq)]
pub struct Multiple<T> {
    items: Vec<T>,
}

impl<T> Multiple<T> {
    /// Wraps a list of results.
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Result at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterates the results in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Unwraps the batch.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
