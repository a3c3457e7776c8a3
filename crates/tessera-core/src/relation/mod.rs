//! The relation layer: what a computation is, independent of how it runs.
//!
//! - [`Producer`] describes a computation; [`Evaluable`] runs it.
//! - [`Countable`] reports how many parallel groups a node represents.
//! - [`Node`], [`Parent`] and [`Tree`] give the traversal vocabulary used by
//!   the optimizer, with [`validate_acyclic`] as the guard that must run before
//!   any recursive walk.
//! - [`Delegated`] and [`DelegationArena`] model forwarding chains.
//! - [`Factor`] and [`Composition`] build new producers from existing ones.

mod composition;
mod delegated;
mod evaluable;
mod factor;
mod producer;
mod streaming;
mod tree;

pub use composition::{ComposeThen, Composition, CompositionRef, FnComposition};
pub use delegated::{DelegateId, Delegated, DelegationArena};
pub use evaluable::{Evaluable, FixedEvaluable, FnEvaluable, Multiple};
pub use factor::{Chain, Factor, FactorRef, FnFactor};
pub use producer::{ConstantProducer, EvaluableRef, FnProducer, Producer, ProducerRef};
pub use streaming::{EvaluableExt, Executor, Job, StreamingEvaluable, ThreadExecutor};
pub use tree::{Countable, Node, Parent, Tree, validate_acyclic};
