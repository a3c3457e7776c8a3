//! Kernel intermediate representation.
//!
//! A [`Scope`] is an ordered list of [`Statement`]s plus the functions it
//! requires. Control flow is expressed with [`Cases`] (guarded branches) and
//! [`Repeated`] (bounded loops) rather than host-language constructs, so any
//! imperative kernel language can be targeted by a [`CodePrintWriter`].

mod expression;
mod statement;
mod writer;

pub use expression::{BinaryOp, Expression, ExpressionType, UnaryOp};
pub use statement::{
    CallArgument, Cases, Parameter, ParameterKind, Repeated, Scope, Statement,
};
pub use writer::{CLanguageWriter, CodePrintWriter, render};
