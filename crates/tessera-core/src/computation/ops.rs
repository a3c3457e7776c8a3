//! Arithmetic, mapping, concatenation and reduction nodes.

use std::sync::Arc;

use crate::collect::Shape;
use crate::error::{Error, Result};
use crate::kernel::KernelStructureContext;
use crate::scope::{BinaryOp, Expression, ExpressionType, Repeated, Scope, UnaryOp};

use super::{Computation, InputAccess, KernelIo, NodeRef};

/// Binary element-wise operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementwiseOp {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`
    Divide,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
}

impl ElementwiseOp {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    fn binary(self) -> BinaryOp {
        match self {
            Self::Add => BinaryOp::Add,
            Self::Subtract => BinaryOp::Sub,
            Self::Multiply => BinaryOp::Mul,
            Self::Divide => BinaryOp::Div,
            Self::Min => BinaryOp::Min,
            Self::Max => BinaryOp::Max,
        }
    }
}

/// Binary element-wise computation with scalar broadcast.
///
/// Operands must have the same size, or one of them must be a fixed single
/// element, which is broadcast. Two variable-count operands must agree on
/// their elements per group.
#[derive(Debug, Clone)]
pub struct Elementwise {
    op: ElementwiseOp,
    shape: Shape,
    left: NodeRef,
    right: NodeRef,
}

fn broadcasts(node: &NodeRef) -> bool {
    node.is_fixed_count() && node.shape().size() == 1
}

impl Elementwise {
    /// `op(left, right)`, validating the operand shapes.
    pub fn new(op: ElementwiseOp, left: NodeRef, right: NodeRef) -> Result<Self> {
        let (ls, rs) = (left.shape(), right.shape());
        let shape = match (left.is_fixed_count(), right.is_fixed_count()) {
            (true, true) if ls.size() == rs.size() => Some(ls.clone()),
            (false, false) if ls.item_size() == rs.item_size() => Some(ls.clone()),
            _ if broadcasts(&right) => Some(ls.clone()),
            _ if broadcasts(&left) => Some(rs.clone()),
            _ => None,
        };
        let shape = shape.ok_or_else(|| {
            Error::validation(
                op.name(),
                format!(
                    "operands '{}' {ls} and '{}' {rs} have incompatible shapes",
                    left.name(),
                    right.name()
                ),
            )
        })?;
        Ok(Self {
            op,
            shape,
            left,
            right,
        })
    }

    /// The operation.
    pub fn op(&self) -> ElementwiseOp {
        self.op
    }
}

impl Computation for Elementwise {
    fn name(&self) -> String {
        self.op.name().into()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.left), Arc::clone(&self.right)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let mut inputs = inputs.into_iter();
        let left = inputs.next().unwrap_or_else(|| Arc::clone(&self.left));
        let right = inputs.next().unwrap_or_else(|| Arc::clone(&self.right));
        Arc::new(Self {
            op: self.op,
            shape: self.shape.clone(),
            left,
            right,
        })
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        let [left, right] = inputs else {
            return Err(Error::execution(format!("{} expects two inputs", self.op.name())));
        };
        let operand = |node: &NodeRef, access: &InputAccess| {
            if broadcasts(node) {
                access.value_at(&Expression::integer(0))
            } else {
                access.value_at(index)
            }
        };
        Ok(Expression::binary(
            self.op.binary(),
            operand(&self.left, left)?,
            operand(&self.right, right)?,
        ))
    }
}

/// Unary element-wise function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapOp {
    /// `-x`
    Negate,
    /// `|x|`
    Abs,
    /// `cos(x)`
    Cos,
    /// `sin(x)`
    Sin,
    /// `sqrt(x)`
    Sqrt,
    /// `exp(x)`
    Exp,
}

impl MapOp {
    fn name(self) -> &'static str {
        match self {
            Self::Negate => "negate",
            Self::Abs => "abs",
            Self::Cos => "cos",
            Self::Sin => "sin",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
        }
    }

    fn unary(self) -> UnaryOp {
        match self {
            Self::Negate => UnaryOp::Neg,
            Self::Abs => UnaryOp::Abs,
            Self::Cos => UnaryOp::Cos,
            Self::Sin => UnaryOp::Sin,
            Self::Sqrt => UnaryOp::Sqrt,
            Self::Exp => UnaryOp::Exp,
        }
    }
}

/// Unary element-wise computation.
#[derive(Debug, Clone)]
pub struct Map {
    op: MapOp,
    input: NodeRef,
}

impl Map {
    /// `op(input)`.
    pub fn new(op: MapOp, input: NodeRef) -> Self {
        Self { op, input }
    }
}

impl Computation for Map {
    fn name(&self) -> String {
        self.op.name().into()
    }

    fn shape(&self) -> Shape {
        self.input.shape()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.input)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let input = inputs
            .into_iter()
            .next()
            .unwrap_or_else(|| Arc::clone(&self.input));
        Arc::new(Self::new(self.op, input))
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        let input = inputs
            .first()
            .ok_or_else(|| Error::execution(format!("{} expects one input", self.op.name())))?;
        Ok(Expression::unary(self.op.unary(), input.value_at(index)?))
    }
}

/// Concatenation along the leading dimension.
#[derive(Debug, Clone)]
pub struct Concat {
    shape: Shape,
    inputs: Vec<NodeRef>,
}

impl Concat {
    /// Concatenates fixed-count inputs with equal item sizes.
    pub fn new(inputs: Vec<NodeRef>) -> Result<Self> {
        let Some(first) = inputs.first() else {
            return Err(Error::validation("concat", "needs at least one input"));
        };
        let item = first.shape().item_size();
        let mut dims = first.shape().dims().to_vec();
        dims[0] = 0;
        for input in &inputs {
            if !input.is_fixed_count() {
                return Err(Error::validation(
                    "concat",
                    format!("input '{}' has a variable count", input.name()),
                ));
            }
            if input.shape().item_size() != item {
                return Err(Error::validation(
                    "concat",
                    format!(
                        "input '{}' {} does not match item size {item}",
                        input.name(),
                        input.shape()
                    ),
                ));
            }
            dims[0] += input.shape().count();
        }
        Ok(Self {
            shape: Shape::new(dims),
            inputs,
        })
    }
}

impl Computation for Concat {
    fn name(&self) -> String {
        "concat".into()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        self.inputs.clone()
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(Self {
            shape: self.shape.clone(),
            inputs,
        })
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        let sizes: Vec<usize> = self.inputs.iter().map(|i| i.shape().size()).collect();
        let mut offset: usize = sizes.iter().sum();
        let mut value = Expression::double(0.0);
        // Built back to front: each guard falls through to the later inputs.
        for (access, size) in inputs.iter().zip(&sizes).rev() {
            offset -= size;
            let local = index.clone() - offset;
            value = Expression::conditional(
                index.clone().less_than(offset + size),
                access.value_at(&local)?,
                value,
            );
        }
        Ok(value)
    }
}

/// Sum of every element of the input.
#[derive(Debug, Clone)]
pub struct SumReduce {
    input: NodeRef,
}

impl SumReduce {
    /// Sum of `input`.
    pub fn new(input: NodeRef) -> Self {
        Self { input }
    }
}

fn accumulate(scope: &mut Scope, output: &str, limit: Expression, term: Expression) {
    let total = scope.declare("total", 0.0);
    let mut body = Scope::new("accumulate");
    body.assign("total", total.clone() + term);
    scope.repeat(Repeated::range("i", limit, body));
    scope.store(output, Expression::kernel_index(), total);
}

impl Computation for SumReduce {
    fn name(&self) -> String {
        "sum".into()
    }

    fn shape(&self) -> Shape {
        Shape::scalar()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.input)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let input = inputs
            .into_iter()
            .next()
            .unwrap_or_else(|| Arc::clone(&self.input));
        Arc::new(Self::new(input))
    }

    fn is_fixed_count(&self) -> bool {
        true
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        None
    }

    fn aggregation_count(&self) -> u64 {
        self.input.shape().size() as u64
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, _ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let input = io.array(0)?;
        let i = Expression::var("i", ExpressionType::Integer);
        let mut scope = Scope::new("sum");
        accumulate(
            &mut scope,
            &io.output,
            Expression::length(input),
            Expression::load(input, i),
        );
        Ok(scope)
    }
}

/// Inner product of two inputs of equal size.
#[derive(Debug, Clone)]
pub struct Dot {
    left: NodeRef,
    right: NodeRef,
}

impl Dot {
    /// `sum(left * right)`.
    pub fn new(left: NodeRef, right: NodeRef) -> Result<Self> {
        let fixed = left.is_fixed_count() && right.is_fixed_count();
        let same = if fixed {
            left.shape().size() == right.shape().size()
        } else {
            left.shape().item_size() == right.shape().item_size()
        };
        if !same {
            return Err(Error::validation(
                "dot",
                format!(
                    "operands '{}' {} and '{}' {} differ in size",
                    left.name(),
                    left.shape(),
                    right.name(),
                    right.shape()
                ),
            ));
        }
        Ok(Self { left, right })
    }
}

impl Computation for Dot {
    fn name(&self) -> String {
        "dot".into()
    }

    fn shape(&self) -> Shape {
        Shape::scalar()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.left), Arc::clone(&self.right)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let mut inputs = inputs.into_iter();
        let left = inputs.next().unwrap_or_else(|| Arc::clone(&self.left));
        let right = inputs.next().unwrap_or_else(|| Arc::clone(&self.right));
        Arc::new(Self { left, right })
    }

    fn is_fixed_count(&self) -> bool {
        true
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        None
    }

    fn aggregation_count(&self) -> u64 {
        self.left.shape().size() as u64
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, _ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let (left, right) = (io.array(0)?, io.array(1)?);
        let i = Expression::var("i", ExpressionType::Integer);
        let mut scope = Scope::new("dot");
        let limit = Expression::length(left).min(Expression::length(right));
        accumulate(
            &mut scope,
            &io.output,
            limit,
            Expression::load(left, i.clone()) * Expression::load(right, i),
        );
        Ok(scope)
    }
}
