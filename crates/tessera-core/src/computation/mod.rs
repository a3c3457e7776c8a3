//! Collection computations: the nodes of a producer tree.
//!
//! A [`Computation`] describes one step over [`PackedCollection`]s. Most nodes
//! compile to a kernel with one lane per parallel group; nodes that are
//! *traversable* can instead be inlined into a consumer's kernel through
//! [`Computation::value_at`]. [`CollectionProducer`] is the handle users build
//! trees with: it adds compilation caching, the optimizer traits and the
//! arithmetic builders.
//!
//! Backends outside this crate add new node kinds by implementing
//! [`Computation`] and wrapping them with [`CollectionProducer::from_node`].

mod compile;
mod nodes;
mod ops;
mod producer;

use std::fmt;
use std::sync::Arc;

use crate::collect::{PackedCollection, Shape};
use crate::error::{Error, Result};
use crate::kernel::KernelStructureContext;
use crate::relation::ProducerRef;
use crate::scope::{Expression, ExpressionType, Repeated, Scope};

pub use nodes::{Argument, Constant, Delegate, Dynamic, Isolated, Provider};
pub use ops::{Concat, Dot, Elementwise, ElementwiseOp, Map, MapOp, SumReduce};
pub use producer::{CollectionProducer, MapFactor};

/// Shared handle to a computation node. Identity is pointer identity.
pub type NodeRef = Arc<dyn Computation>;

/// Identity of a node for deduplication and cycle checks.
pub fn node_id(node: &NodeRef) -> usize {
    Arc::as_ptr(node).cast::<()>() as usize
}

/// Where a node's values come from when it is used by a kernel.
#[derive(Clone)]
pub enum Binding {
    /// Computed by the node's own scope.
    Computed,
    /// The positional evaluation argument with this index.
    Input(usize),
    /// A fixed collection.
    Data(PackedCollection),
    /// An opaque producer evaluated on every call.
    Producer(ProducerRef<PackedCollection>),
    /// The wrapped node, compiled as an independent kernel.
    Isolated(NodeRef),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Computed => f.write_str("Computed"),
            Self::Input(i) => write!(f, "Input({i})"),
            Self::Data(c) => f.debug_tuple("Data").field(c).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
            Self::Isolated(node) => write!(f, "Isolated({})", node.name()),
        }
    }
}

/// How a kernel reads one input of a node.
#[derive(Debug, Clone)]
pub enum InputAccess {
    /// A kernel array parameter.
    Array {
        /// Parameter name.
        name: String,
    },
    /// An inlined traversable node.
    Inline {
        /// The inlined node.
        node: NodeRef,
        /// Access to the inlined node's own inputs.
        inputs: Vec<InputAccess>,
    },
}

impl InputAccess {
    /// Element `index` of the input.
    pub fn value_at(&self, index: &Expression) -> Result<Expression> {
        match self {
            Self::Array { name } => Ok(Expression::load(name.clone(), index.clone())),
            Self::Inline { node, inputs } => node.value_at(index, inputs),
        }
    }

    /// Number of elements of the input.
    pub fn length(&self) -> Expression {
        match self {
            Self::Array { name } => Expression::length(name.clone()),
            Self::Inline { node, .. } => Expression::from(node.shape().size()),
        }
    }

    /// Name of the array parameter, if the input is not inlined.
    pub fn array_name(&self) -> Option<&str> {
        match self {
            Self::Array { name } => Some(name),
            Self::Inline { .. } => None,
        }
    }
}

/// Names a node's kernel sees: its output array and its inputs.
#[derive(Debug, Clone)]
pub struct KernelIo {
    /// Output array parameter.
    pub output: String,
    /// One access per node input, in order.
    pub inputs: Vec<InputAccess>,
}

impl KernelIo {
    /// Array parameter of input `i`.
    ///
    /// Fails if the input was inlined, which only happens for nodes that do
    /// not declare [`Computation::requires_array_inputs`].
    pub fn array(&self, i: usize) -> Result<&str> {
        self.inputs
            .get(i)
            .and_then(InputAccess::array_name)
            .ok_or_else(|| Error::execution(format!("input {i} is not bound to an array")))
    }
}

/// One node of a collection computation tree.
pub trait Computation: Send + Sync + fmt::Debug {
    /// Label used for diagnostics, kernel names and isolation targets.
    fn name(&self) -> String;

    /// Result shape. For variable-count nodes the leading count is nominal.
    fn shape(&self) -> Shape;

    /// Direct inputs, in order.
    fn inputs(&self) -> Vec<NodeRef>;

    /// An equivalent node over new inputs of the same shapes.
    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef;

    /// Parallel groups: one kernel lane each.
    fn count(&self) -> u64 {
        self.shape().count() as u64
    }

    /// Whether [`count`](Computation::count) is known before evaluation.
    fn is_fixed_count(&self) -> bool {
        self.inputs().iter().all(|input| input.is_fixed_count())
    }

    /// For variable-count nodes: the argument whose length decides the count,
    /// and that argument's elements per group.
    fn dynamic_source(&self) -> Option<(usize, usize)> {
        self.inputs().iter().find_map(|input| input.dynamic_source())
    }

    /// How many input elements feed one output element.
    fn aggregation_count(&self) -> u64 {
        1
    }

    /// Where the node's values come from.
    fn binding(&self) -> Binding {
        Binding::Computed
    }

    /// Whether [`value_at`](Computation::value_at) is implemented, so that
    /// consumers may inline the node.
    fn is_traversable(&self) -> bool {
        false
    }

    /// Whether every input must be materialized as an array.
    fn requires_array_inputs(&self) -> bool {
        false
    }

    /// Expression for element `index` of the result.
    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        let _ = (index, inputs);
        Err(Error::unsupported(format!("value_at on '{}'", self.name())))
    }

    /// Kernel body writing the whole result for one lane.
    ///
    /// The default writes every element of the lane's item through
    /// [`value_at`](Computation::value_at).
    fn scope(&self, ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let item = self.shape().item_size();
        let mut scope = Scope::new(self.name());
        if item == 1 {
            let index = ctx.kernel_index();
            let value = self.value_at(&index, &io.inputs)?;
            scope.store(io.output.clone(), index, value);
        } else {
            let mut body = Scope::new("item");
            let element = Expression::var("element", ExpressionType::Integer);
            let index = ctx.kernel_index() * item + element;
            let value = self.value_at(&index, &io.inputs)?;
            body.store(io.output.clone(), index, value);
            scope.repeat(Repeated::range("element", item, body));
        }
        Ok(scope)
    }

    /// For pass-through nodes: the node values are forwarded from.
    fn delegate_target(&self) -> Option<NodeRef> {
        None
    }

    /// Binds a late-bound pass-through node. Other nodes refuse.
    fn bind_delegate(&self, target: NodeRef) -> Result<()> {
        let _ = target;
        Err(Error::unsupported(format!(
            "bind_delegate on non-delegate '{}'",
            self.name()
        )))
    }
}

/// Turns a node name into a kernel identifier.
pub(crate) fn identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'k');
    }
    out
}
