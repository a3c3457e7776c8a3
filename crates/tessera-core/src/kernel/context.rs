//! Compilation options and the per-kernel structure context.

use std::fmt;
use std::str::FromStr;

use crate::editable::{Editable, Property, PropertyValue, property_mismatch};
use crate::error::{Error, Result};
use crate::scope::Expression;

/// How recursive decompositions are emitted.
///
/// `Recursive` emits one self-calling function: small code, call overhead per
/// level. `Unrolled` expands the recursion at compile time into straight-line
/// code: no calls, code size grows with the problem size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompilationStrategy {
    /// Native recursive function calls.
    #[default]
    Recursive,
    /// Compile-time unrolled recursion.
    Unrolled,
}

impl CompilationStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [Self; 2] = [Self::Recursive, Self::Unrolled];

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Unrolled => "unrolled",
        }
    }
}

impl fmt::Display for CompilationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilationStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "unrolled" => Ok(Self::Unrolled),
            other => Err(Error::validation(
                "compilation strategy",
                format!("unknown strategy '{other}' (expected recursive or unrolled)"),
            )),
        }
    }
}

/// Default limit on nested calls while a kernel runs.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Options applied to every kernel compiled from one producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emission strategy for recursive decompositions.
    pub strategy: CompilationStrategy,
    /// Nested call limit enforced by the host executor.
    pub max_call_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strategy: CompilationStrategy::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl CompileOptions {
    /// Default options with the given strategy.
    pub fn with_strategy(strategy: CompilationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }
}

impl Editable for CompileOptions {
    fn properties(&self) -> Vec<Property> {
        vec![
            Property::new(
                "strategy",
                PropertyValue::Choice(self.strategy.as_str().to_string()),
            ),
            Property::new(
                "max_call_depth",
                PropertyValue::Integer(self.max_call_depth as u64),
            ),
        ]
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        match (name, &value) {
            ("strategy", PropertyValue::Choice(s)) => self.strategy = s.parse()?,
            ("max_call_depth", PropertyValue::Integer(v)) if *v > 0 => {
                self.max_call_depth = *v as usize;
            }
            _ => return Err(property_mismatch(name, &value)),
        }
        Ok(())
    }
}

/// How many lanes a kernel launch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelSizing {
    /// Count known at compile time: a static grid.
    Fixed(usize),
    /// Count read from a runtime argument: `args[argument].len() / item_size`.
    Variable {
        /// Positional argument that determines the count.
        argument: usize,
        /// Elements of that argument per lane.
        item_size: usize,
    },
}

/// What a computation sees while building its kernel scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStructureContext {
    options: CompileOptions,
    sizing: KernelSizing,
}

impl KernelStructureContext {
    /// Context for one kernel.
    pub fn new(options: CompileOptions, sizing: KernelSizing) -> Self {
        Self { options, sizing }
    }

    /// Index of the lane being executed.
    pub fn kernel_index(&self) -> Expression {
        Expression::kernel_index()
    }

    /// Compilation options.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Emission strategy for recursive decompositions.
    pub fn strategy(&self) -> CompilationStrategy {
        self.options.strategy
    }

    /// Lane count policy.
    pub fn sizing(&self) -> KernelSizing {
        self.sizing
    }
}
