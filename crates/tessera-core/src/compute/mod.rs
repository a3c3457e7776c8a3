//! Process trees and the parallelism optimizer.

mod process;
mod settings;

pub use process::{
    IsolationDecision, ParallelProcess, ParallelProcessContext, Process, Rewrites, isolation_decision,
};
pub use settings::{
    DEFAULT_MAX_COUNT, DEFAULT_MIN_COUNT, DEFAULT_TARGET_COUNT, IsolationTarget,
    OptimizationPolicy, ParallelismSettings,
};
