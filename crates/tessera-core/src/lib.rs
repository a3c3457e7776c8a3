//! Tessera Core - deferred computation graphs compiled to kernels
//!
//! Computations are described as trees of immutable producers, optimized by
//! deciding where subtrees run as independent kernels, lowered into a small
//! kernel IR and executed lane by lane.
//!
//! # Core Abstractions
//!
//! ## Describing and running
//!
//! - [`Producer`] - immutable description of a computation
//! - [`Evaluable`] - compiled, repeatedly invokable form of a producer
//! - [`FixedEvaluable`] - evaluable whose result ignores its arguments
//! - [`EvaluableExt::into_async`] - streaming evaluation on an [`Executor`]
//!
//! ## Trees and the optimizer
//!
//! - [`Tree`], [`Node`], [`Parent`] - traversal vocabulary
//! - [`Countable`] - parallel group count, fixed or variable
//! - [`Process`] / [`ParallelProcess`] - rewritable trees and the
//!   inline-or-isolate optimizer, steered by [`OptimizationPolicy`]
//! - [`Delegated`] / [`DelegationArena`] - forwarding chains with cycle checks
//!
//! ## Combinators
//!
//! - [`Factor`] - producer to producer, chainable with `and_then`
//! - [`Composition`] - two producers to one, evaluating each operand once
//!
//! ## Kernels
//!
//! - [`Scope`], [`Expression`], [`Cases`], [`Repeated`] - kernel IR
//! - [`CodePrintWriter`] / [`CLanguageWriter`] - source rendering
//! - [`KernelCompiler`] / [`Kernel`] - lowering and host execution
//!
//! ## Collections
//!
//! - [`PackedCollection`] / [`Shape`] - shaped `f64` buffers with shared memory
//! - [`CollectionProducer`] - builder and producer for collection computations
//! - [`Computation`] - extension point for new node kinds
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{
//!     CollectionProducer, OptimizationPolicy, PackedCollection, ParallelProcess, Producer, Shape,
//! };
//!
//! let x = CollectionProducer::argument(0, Shape::vector(4));
//! let y = x.multiply(&x).unwrap().sum();
//! let optimized = y.optimized(&OptimizationPolicy::default()).unwrap();
//!
//! let out = optimized
//!     .evaluate(&[PackedCollection::from_slice(&[1.0, 2.0, 3.0, 4.0])])
//!     .unwrap();
//! assert_eq!(out.to_vec(), vec![30.0]);
//! ```

pub mod collect;
pub mod computation;
pub mod compute;
pub mod editable;
pub mod error;
pub mod kernel;
pub mod relation;
pub mod scope;

pub use collect::{PackedCollection, Shape};
pub use computation::{
    Argument, Binding, CollectionProducer, Computation, Concat, Constant, Delegate, Dot, Dynamic,
    Elementwise, ElementwiseOp, InputAccess, Isolated, KernelIo, Map, MapFactor, MapOp, NodeRef,
    Provider, SumReduce, node_id,
};
pub use compute::{
    DEFAULT_MAX_COUNT, DEFAULT_MIN_COUNT, DEFAULT_TARGET_COUNT, IsolationDecision,
    IsolationTarget, OptimizationPolicy, ParallelProcess, ParallelProcessContext,
    ParallelismSettings, Process, Rewrites, isolation_decision,
};
pub use editable::{Editable, Property, PropertyKind, PropertyValue};
pub use error::{Error, Result};
pub use kernel::{
    CompilationStrategy, CompileOptions, DEFAULT_MAX_CALL_DEPTH, Kernel, KernelCompiler,
    KernelSizing, KernelStructureContext,
};
pub use relation::{
    Chain, ComposeThen, Composition, CompositionRef, ConstantProducer, DelegateId, Delegated,
    DelegationArena, Evaluable, EvaluableExt, EvaluableRef, Executor, Factor, FactorRef,
    FixedEvaluable, FnComposition, FnEvaluable, FnFactor, FnProducer, Multiple, Node, Parent,
    Producer, ProducerRef, StreamingEvaluable, ThreadExecutor, Tree, Countable,
    validate_acyclic,
};
pub use scope::{
    BinaryOp, CLanguageWriter, CallArgument, Cases, CodePrintWriter, Expression,
    ExpressionType, Parameter, ParameterKind, Repeated, Scope, Statement, UnaryOp,
};
