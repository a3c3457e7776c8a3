//! The user-facing producer handle for collection computations.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collect::{PackedCollection, Shape};
use crate::compute::{
    OptimizationPolicy, ParallelProcess, ParallelProcessContext, Process, Rewrites,
};
use crate::error::{Error, Result};
use crate::kernel::CompileOptions;
use crate::relation::{
    Chain, Countable, Delegated, EvaluableRef, Factor, FactorRef, Node, Parent, Producer,
    ProducerRef, Tree, validate_acyclic,
};

use super::compile::{CompiledComputation, IntoDestination};
use super::nodes::{Argument, Constant, Delegate, Dynamic, Isolated, Provider, is_independent};
use super::ops::{Concat, Dot, Elementwise, ElementwiseOp, Map, MapOp, SumReduce};
use super::{Binding, NodeRef, node_id};

type Cache = Arc<Mutex<Option<EvaluableRef<PackedCollection>>>>;

/// Handle to a collection computation tree.
///
/// Cloning is cheap and shares both the node and its compilation cache.
/// Every builder returns a new producer; existing producers never change.
///
/// # Example
///
/// ```rust
/// use tessera_core::{CollectionProducer, PackedCollection, Producer, Shape};
///
/// let x = CollectionProducer::argument(0, Shape::vector(3));
/// let y = x.multiply(&CollectionProducer::scalar(2.0)).unwrap().add(&x).unwrap();
/// let out = y.evaluate(&[PackedCollection::from_slice(&[1.0, 2.0, 3.0])]).unwrap();
/// assert_eq!(out.to_vec(), vec![3.0, 6.0, 9.0]);
/// ```
#[derive(Clone)]
pub struct CollectionProducer {
    node: NodeRef,
    options: CompileOptions,
    cache: Cache,
}

impl CollectionProducer {
    /// Wraps an arbitrary computation node.
    pub fn from_node(node: NodeRef) -> Self {
        Self {
            node,
            options: CompileOptions::default(),
            cache: Cache::default(),
        }
    }

    fn derive(&self, node: NodeRef) -> Self {
        Self {
            node,
            options: self.options,
            cache: Cache::default(),
        }
    }

    /// Fixed-shape positional argument.
    pub fn argument(index: usize, shape: Shape) -> Self {
        Self::from_node(Arc::new(Argument::fixed(index, shape)))
    }

    /// Variable-count positional argument with `item_size` elements per group.
    pub fn variable_argument(index: usize, item_size: usize) -> Result<Self> {
        Ok(Self::from_node(Arc::new(Argument::variable(
            index, item_size,
        )?)))
    }

    /// Fixed collection.
    pub fn provider(value: PackedCollection) -> Self {
        Self::from_node(Arc::new(Provider::new(value)))
    }

    /// `value` over `shape`.
    pub fn constant(value: f64, shape: Shape) -> Self {
        Self::from_node(Arc::new(Constant::new(value, shape)))
    }

    /// Single-element constant, broadcast by element-wise operations.
    pub fn scalar(value: f64) -> Self {
        Self::constant(value, Shape::scalar())
    }

    /// Opaque producer whose results have `shape`.
    pub fn dynamic(
        name: impl Into<String>,
        shape: Shape,
        producer: ProducerRef<PackedCollection>,
    ) -> Self {
        Self::from_node(Arc::new(Dynamic::new(name, shape, producer)))
    }

    /// Unbound delegate. Bind it with [`set_delegate`](Self::set_delegate).
    pub fn unbound_delegate(name: impl Into<String>, shape: Shape) -> Self {
        Self::from_node(Arc::new(Delegate::new(name, shape)))
    }

    /// Binds this delegate producer to `target`.
    ///
    /// Fails if the producer is not a delegate, if it is already bound, or if
    /// the shapes differ.
    pub fn set_delegate(&self, target: &Self) -> Result<()> {
        self.node.bind_delegate(Arc::clone(&target.node))?;
        self.cache.lock().take();
        Ok(())
    }

    /// The underlying node.
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Result shape (nominal count for variable-count producers).
    pub fn shape(&self) -> Shape {
        self.node.shape()
    }

    /// Options used when this producer compiles.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Same tree compiled with different options.
    pub fn with_options(&self, options: CompileOptions) -> Self {
        Self {
            node: Arc::clone(&self.node),
            options,
            cache: Cache::default(),
        }
    }

    /// Whether both handles refer to the same node.
    pub fn same_node(&self, other: &Self) -> bool {
        node_id(&self.node) == node_id(&other.node)
    }

    /// Rendered source of the root kernel, compiling if needed.
    pub fn kernel_source(&self) -> Result<Option<String>> {
        validate_acyclic(self)?;
        let compiled = CompiledComputation::root(&self.node, &self.options)?;
        Ok(compiled.source().map(str::to_string))
    }

    fn elementwise(&self, op: ElementwiseOp, other: &Self) -> Result<Self> {
        let node = Elementwise::new(op, Arc::clone(&self.node), Arc::clone(&other.node))?;
        Ok(self.derive(Arc::new(node)))
    }

    /// `self + other`
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Add, other)
    }

    /// `self - other`
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Subtract, other)
    }

    /// `self * other`
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Multiply, other)
    }

    /// `self / other`
    pub fn divide(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Divide, other)
    }

    /// Element-wise minimum.
    pub fn min(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Min, other)
    }

    /// Element-wise maximum.
    pub fn max(&self, other: &Self) -> Result<Self> {
        self.elementwise(ElementwiseOp::Max, other)
    }

    /// Applies a unary function to every element.
    pub fn map(&self, op: MapOp) -> Self {
        self.derive(Arc::new(Map::new(op, Arc::clone(&self.node))))
    }

    /// Concatenates `parts` along the leading dimension.
    pub fn concat(parts: &[Self]) -> Result<Self> {
        let nodes = parts.iter().map(|p| Arc::clone(&p.node)).collect();
        let node: NodeRef = Arc::new(Concat::new(nodes)?);
        Ok(match parts.first() {
            Some(first) => first.derive(node),
            None => Self::from_node(node),
        })
    }

    /// Sum of all elements.
    pub fn sum(&self) -> Self {
        self.derive(Arc::new(SumReduce::new(Arc::clone(&self.node))))
    }

    /// Inner product with `other`.
    pub fn dot(&self, other: &Self) -> Result<Self> {
        let node = Dot::new(Arc::clone(&self.node), Arc::clone(&other.node))?;
        Ok(self.derive(Arc::new(node)))
    }
}

impl fmt::Debug for CollectionProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionProducer")
            .field("name", &self.node.name())
            .field("shape", &self.node.shape())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Producer<PackedCollection> for CollectionProducer {
    fn get(&self) -> Result<EvaluableRef<PackedCollection>> {
        if let Some(cached) = self.cache.lock().as_ref() {
            return Ok(Arc::clone(cached));
        }
        validate_acyclic(self)?;
        let compiled: EvaluableRef<PackedCollection> =
            Arc::new(CompiledComputation::root(&self.node, &self.options)?);
        *self.cache.lock() = Some(Arc::clone(&compiled));
        Ok(compiled)
    }

    fn into_destination(&self, destination: PackedCollection) -> Result<EvaluableRef<PackedCollection>> {
        let size = self.node.shape().size();
        if self.node.is_fixed_count() && destination.len() != size {
            return Err(Error::unsupported(format!(
                "'{}' produces {size} elements, destination holds {}",
                self.node.name(),
                destination.len()
            )));
        }
        Ok(Arc::new(IntoDestination::new(self.get()?, destination)))
    }

    fn destroy(&self) {
        self.cache.lock().take();
    }
}

impl Node for CollectionProducer {
    fn node_id(&self) -> usize {
        node_id(&self.node)
    }

    fn node_name(&self) -> String {
        self.node.name()
    }
}

impl Parent<CollectionProducer> for CollectionProducer {
    fn children(&self) -> Vec<CollectionProducer> {
        self.node
            .inputs()
            .into_iter()
            .map(|input| self.derive(input))
            .collect()
    }
}

impl Tree for CollectionProducer {}

impl Countable for CollectionProducer {
    fn count(&self) -> u64 {
        self.node.count()
    }

    fn is_fixed_count(&self) -> bool {
        self.node.is_fixed_count()
    }
}

impl Process for CollectionProducer {
    fn optimize(
        &self,
        ctx: &ParallelProcessContext,
        policy: &OptimizationPolicy,
        rewrites: &mut Rewrites<Self>,
    ) -> Self {
        self.optimize_parallel(ctx, policy, rewrites)
    }

    fn isolate(&self) -> Self {
        if is_independent(&self.node) {
            return self.clone();
        }
        self.derive(Isolated::wrap(Arc::clone(&self.node)))
    }

    fn is_isolated(&self) -> bool {
        matches!(self.node.binding(), Binding::Isolated(_))
    }

    fn generate(&self, children: Vec<Self>) -> Self {
        let inputs = children.into_iter().map(|child| child.node).collect();
        self.derive(self.node.generate(inputs))
    }
}

impl ParallelProcess for CollectionProducer {
    fn aggregation_count(&self) -> u64 {
        self.node.aggregation_count()
    }
}

impl Delegated for CollectionProducer {
    fn delegate(&self) -> Option<Self> {
        self.node.delegate_target().map(|target| self.derive(target))
    }

    fn delegate_id(&self) -> usize {
        node_id(&self.node)
    }

    fn delegate_name(&self) -> String {
        self.node.name()
    }
}

/// Factor applying a unary function to every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFactor {
    op: MapOp,
}

impl MapFactor {
    /// Factor for `op`.
    pub fn new(op: MapOp) -> Self {
        Self { op }
    }
}

impl Factor<CollectionProducer> for MapFactor {
    fn resultant(&self, value: &CollectionProducer) -> CollectionProducer {
        value.map(self.op)
    }

    fn and_then(&self, next: FactorRef<CollectionProducer>) -> Result<FactorRef<CollectionProducer>> {
        Ok(Arc::new(Chain::new(Arc::new(*self), next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> PackedCollection {
        PackedCollection::from_slice(values)
    }

    #[test]
    fn test_get_is_cached() {
        let x = CollectionProducer::argument(0, Shape::vector(2));
        let y = x.map(MapOp::Negate);
        let first = y.get().unwrap();
        let second = y.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        y.destroy();
        let third = y.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_provider_is_fixed() {
        let p = CollectionProducer::provider(series(&[1.0, 2.0]));
        let eval = p.get().unwrap();
        assert_eq!(eval.call().unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_variable_count() {
        let x = CollectionProducer::variable_argument(0, 1).unwrap();
        let y = x.add(&CollectionProducer::scalar(1.0)).unwrap();
        assert!(!y.is_fixed_count());
        assert_eq!(
            y.evaluate(&[series(&[1.0, 2.0, 3.0])]).unwrap().to_vec(),
            vec![2.0, 3.0, 4.0]
        );
        assert_eq!(y.evaluate(&[series(&[5.0])]).unwrap().to_vec(), vec![6.0]);
    }

    #[test]
    fn test_isolate_independent_returns_self() {
        let x = CollectionProducer::argument(0, Shape::vector(2));
        assert!(x.isolate().same_node(&x));
        let y = x.map(MapOp::Abs);
        let isolated = y.isolate();
        assert!(isolated.is_isolated());
        assert!(isolated.isolate().same_node(&isolated));
    }

    #[test]
    fn test_set_delegate_on_plain_node() {
        let x = CollectionProducer::argument(0, Shape::vector(2));
        let err = x.set_delegate(&x.map(MapOp::Cos)).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_map_factor_chain() {
        let x = CollectionProducer::argument(0, Shape::vector(1));
        let negate = MapFactor::new(MapOp::Negate);
        let chained = negate
            .and_then(Arc::new(MapFactor::new(MapOp::Exp)))
            .unwrap();
        let y = chained.resultant(&x);
        let out = y.evaluate(&[series(&[0.0])]).unwrap();
        assert!((out.to_vec()[0] - 1.0).abs() < 1e-12);
        assert_eq!(y.node_name(), "exp");
    }
}
