//! Kernel compilation and the host executor.
//!
//! A [`KernelCompiler`] renders an entry [`Scope`](crate::scope::Scope) to
//! C-family source and lowers it to a [`Program`] that runs lane by lane on the
//! host. The rendered source is kept on the [`Kernel`] for inspection.

mod compiler;
mod context;
mod program;

pub use compiler::{Kernel, KernelCompiler};
pub use context::{
    CompilationStrategy, CompileOptions, DEFAULT_MAX_CALL_DEPTH, KernelSizing,
    KernelStructureContext,
};
pub use program::Program;
