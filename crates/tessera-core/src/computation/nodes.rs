//! Leaf and forwarding nodes.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::collect::{PackedCollection, Shape};
use crate::error::{Error, Result};
use crate::relation::ProducerRef;
use crate::scope::Expression;

use super::{Binding, Computation, InputAccess, NodeRef};

/// Positional evaluation argument.
///
/// A fixed argument has a known shape and is checked on every evaluation. A
/// variable argument only fixes the elements per group; its count is read
/// from the supplied collection.
#[derive(Debug, Clone)]
pub struct Argument {
    index: usize,
    shape: Shape,
    fixed: bool,
}

impl Argument {
    /// Argument `index` with a fixed shape.
    pub fn fixed(index: usize, shape: Shape) -> Self {
        Self {
            index,
            shape,
            fixed: true,
        }
    }

    /// Argument `index` holding any number of groups of `item_size` elements.
    pub fn variable(index: usize, item_size: usize) -> Result<Self> {
        if item_size == 0 {
            return Err(Error::validation("argument", "item size must be positive"));
        }
        let shape = if item_size == 1 {
            Shape::vector(1)
        } else {
            Shape::new([1, item_size])
        };
        Ok(Self {
            index,
            shape,
            fixed: false,
        })
    }

    /// Positional index.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Computation for Argument {
    fn name(&self) -> String {
        format!("argument{}", self.index)
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn generate(&self, _inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(self.clone())
    }

    fn is_fixed_count(&self) -> bool {
        self.fixed
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        (!self.fixed).then_some((self.index, self.shape.item_size()))
    }

    fn binding(&self) -> Binding {
        Binding::Input(self.index)
    }
}

/// A fixed collection. Evaluates to the same value whatever the arguments.
#[derive(Debug, Clone)]
pub struct Provider {
    value: PackedCollection,
}

impl Provider {
    /// Wraps `value`. The collection is shared, not copied.
    pub fn new(value: PackedCollection) -> Self {
        Self { value }
    }
}

impl Computation for Provider {
    fn name(&self) -> String {
        "provider".into()
    }

    fn shape(&self) -> Shape {
        self.value.shape().clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn generate(&self, _inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(self.clone())
    }

    fn binding(&self) -> Binding {
        Binding::Data(self.value.clone())
    }
}

/// One value repeated over a shape.
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
    shape: Shape,
}

impl Constant {
    /// `value` at every element of `shape`.
    pub fn new(value: f64, shape: Shape) -> Self {
        Self { value, shape }
    }
}

impl Computation for Constant {
    fn name(&self) -> String {
        "constant".into()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn generate(&self, _inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(self.clone())
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, _index: &Expression, _inputs: &[InputAccess]) -> Result<Expression> {
        Ok(Expression::double(self.value))
    }
}

/// An opaque producer bridged into the tree.
///
/// The producer is compiled when the enclosing kernel is compiled and
/// evaluated with the caller's arguments once per evaluation.
#[derive(Clone)]
pub struct Dynamic {
    name: String,
    shape: Shape,
    producer: ProducerRef<PackedCollection>,
}

impl Dynamic {
    /// Wraps `producer`, whose results have `shape`.
    pub fn new(
        name: impl Into<String>,
        shape: Shape,
        producer: ProducerRef<PackedCollection>,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            producer,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dynamic")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl Computation for Dynamic {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn generate(&self, _inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(self.clone())
    }

    fn binding(&self) -> Binding {
        Binding::Producer(Arc::clone(&self.producer))
    }
}

/// Late-bound pass-through node.
///
/// Built without a target so that a tree can reference a value before it
/// exists; [`set_target`](Delegate::set_target) binds it exactly once.
pub struct Delegate {
    name: String,
    shape: Shape,
    target: OnceLock<NodeRef>,
}

impl Delegate {
    /// Unbound delegate producing `shape`.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            target: OnceLock::new(),
        }
    }

    /// Binds the delegate. The target must have the delegate's shape.
    ///
    /// The target is held strongly. A binding that closes a loop (a target
    /// that reaches this delegate again) is accepted so validation can report
    /// it, but the nodes on the loop keep each other alive and are never
    /// freed. Run `CollectionProducer::validate_delegate` on new bindings
    /// before keeping a graph around.
    pub fn set_target(&self, target: NodeRef) -> Result<()> {
        if target.shape().size() != self.shape.size() {
            return Err(Error::validation(
                "delegate target",
                format!(
                    "'{}' has shape {}, delegate '{}' expects {}",
                    target.name(),
                    target.shape(),
                    self.name,
                    self.shape
                ),
            ));
        }
        self.target
            .set(target)
            .map_err(|_| Error::DelegateAlreadySet(self.name.clone()))
    }

    /// The bound target.
    pub fn target(&self) -> Option<&NodeRef> {
        self.target.get()
    }
}

impl fmt::Debug for Delegate {
    // Targets can point back at the delegate, so only the target name is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("target", &self.target.get().map(|t| t.name()))
            .finish()
    }
}

impl Computation for Delegate {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        self.target.get().cloned().into_iter().collect()
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let node = Self::new(self.name.clone(), self.shape.clone());
        if let Some(target) = inputs.into_iter().next() {
            let _ = node.target.set(target);
        }
        Arc::new(node)
    }

    fn is_fixed_count(&self) -> bool {
        self.target.get().is_none_or(|t| t.is_fixed_count())
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        match inputs.first() {
            Some(input) => input.value_at(index),
            None => Err(Error::validation(
                "delegate",
                format!("'{}' has no target", self.name),
            )),
        }
    }

    fn delegate_target(&self) -> Option<NodeRef> {
        self.target.get().cloned()
    }

    fn bind_delegate(&self, target: NodeRef) -> Result<()> {
        self.set_target(target)
    }
}

/// Isolation boundary: the wrapped node compiles as its own kernel.
#[derive(Debug, Clone)]
pub struct Isolated {
    inner: NodeRef,
}

impl Isolated {
    /// Wraps `inner`.
    ///
    /// Arguments, providers and isolated nodes already run independently and
    /// are returned unchanged, so wrappers never nest.
    pub fn wrap(inner: NodeRef) -> NodeRef {
        if is_independent(&inner) {
            inner
        } else {
            Arc::new(Self { inner })
        }
    }

    /// The wrapped node.
    pub fn inner(&self) -> &NodeRef {
        &self.inner
    }
}

/// Whether `node` never takes part in a consumer's kernel.
pub(crate) fn is_independent(node: &NodeRef) -> bool {
    matches!(
        node.binding(),
        Binding::Input(_) | Binding::Data(_) | Binding::Isolated(_)
    )
}

impl Computation for Isolated {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn shape(&self) -> Shape {
        self.inner.shape()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.inner)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        match inputs.into_iter().next() {
            Some(inner) => Self::wrap(inner),
            None => Arc::new(self.clone()),
        }
    }

    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn is_fixed_count(&self) -> bool {
        self.inner.is_fixed_count()
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        self.inner.dynamic_source()
    }

    fn aggregation_count(&self) -> u64 {
        self.inner.aggregation_count()
    }

    fn binding(&self) -> Binding {
        Binding::Isolated(Arc::clone(&self.inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolating_independent_nodes_is_identity() {
        let arg: NodeRef = Arc::new(Argument::fixed(0, Shape::vector(4)));
        let wrapped = Isolated::wrap(Arc::clone(&arg));
        assert!(Arc::ptr_eq(&arg, &wrapped));

        let constant: NodeRef = Arc::new(Constant::new(1.0, Shape::vector(4)));
        let once = Isolated::wrap(constant);
        let twice = Isolated::wrap(Arc::clone(&once));
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn test_variable_argument() {
        let arg = Argument::variable(2, 3).unwrap();
        assert!(!arg.is_fixed_count());
        assert_eq!(arg.dynamic_source(), Some((2, 3)));
        assert!(Argument::variable(0, 0).is_err());
    }

    #[test]
    fn test_delegate_set_once() {
        let delegate = Delegate::new("d", Shape::vector(2));
        assert!(delegate.inputs().is_empty());
        delegate
            .set_target(Arc::new(Constant::new(1.0, Shape::vector(2))))
            .unwrap();
        let again = delegate.set_target(Arc::new(Constant::new(2.0, Shape::vector(2))));
        assert!(matches!(again, Err(Error::DelegateAlreadySet(_))));
        assert_eq!(delegate.inputs().len(), 1);
    }

    #[test]
    fn test_acyclic_delegate_chain_is_freed() {
        let target: NodeRef = Arc::new(Constant::new(1.0, Shape::vector(2)));
        let watch = Arc::downgrade(&target);
        let delegate: NodeRef = Arc::new(Delegate::new("d", Shape::vector(2)));
        delegate.bind_delegate(target).unwrap();
        assert!(watch.upgrade().is_some());
        drop(delegate);
        assert!(watch.upgrade().is_none());
    }

    #[test]
    fn test_delegate_loop_holds_its_nodes() {
        let a = Arc::new(Delegate::new("a", Shape::vector(2)));
        let b = Arc::new(Delegate::new("b", Shape::vector(2)));
        a.set_target(Arc::clone(&b) as NodeRef).unwrap();
        b.set_target(Arc::clone(&a) as NodeRef).unwrap();
        let watch = Arc::downgrade(&a);
        drop(a);
        drop(b);
        assert!(watch.upgrade().is_some());
    }

    #[test]
    fn test_delegate_rejects_shape_mismatch() {
        let delegate = Delegate::new("d", Shape::vector(2));
        let err = delegate
            .set_target(Arc::new(Constant::new(1.0, Shape::vector(3))))
            .unwrap_err();
        assert!(err.is_validation());
    }
}
