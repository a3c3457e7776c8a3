//! Optimizer thresholds and isolation policy.

use std::fmt;
use std::sync::Arc;

use crate::editable::{Editable, Property, PropertyValue, property_mismatch};
use crate::error::{Error, Result};

/// Default floor below which an isolated kernel is considered too small.
pub const DEFAULT_MIN_COUNT: u64 = 1 << 8;
/// Default count above which narrow-max mode stops isolating.
pub const DEFAULT_TARGET_COUNT: u64 = 1 << 17;
/// Default ceiling above which children are never isolated.
pub const DEFAULT_MAX_COUNT: u64 = 1 << 20;

/// Count thresholds steering the inline-or-isolate decision.
///
/// The defaults are tuned for a particular accelerator profile; only their
/// ordering `min_count <= target_count <= max_count` is structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelismSettings {
    /// Floor for a worthwhile kernel size.
    pub min_count: u64,
    /// Soft ceiling used by narrow-max mode.
    pub target_count: u64,
    /// Hard ceiling: larger children are always inlined.
    pub max_count: u64,
    /// Inline when the enclosing context already covers the largest child.
    pub enable_contextual_count: bool,
    /// Inline children above `target_count` once the context reaches `min_count`.
    pub enable_narrow_max: bool,
}

impl Default for ParallelismSettings {
    fn default() -> Self {
        Self {
            min_count: DEFAULT_MIN_COUNT,
            target_count: DEFAULT_TARGET_COUNT,
            max_count: DEFAULT_MAX_COUNT,
            enable_contextual_count: false,
            enable_narrow_max: true,
        }
    }
}

impl ParallelismSettings {
    /// Checks that the thresholds are positive and ordered.
    pub fn validate(&self) -> Result<()> {
        if self.min_count == 0 {
            return Err(Error::validation("min_count", "must be positive"));
        }
        if self.min_count > self.target_count || self.target_count > self.max_count {
            return Err(Error::validation(
                "parallelism thresholds",
                format!(
                    "expected min_count <= target_count <= max_count, got {} / {} / {}",
                    self.min_count, self.target_count, self.max_count
                ),
            ));
        }
        Ok(())
    }
}

impl Editable for ParallelismSettings {
    fn properties(&self) -> Vec<Property> {
        vec![
            Property::new("min_count", PropertyValue::Integer(self.min_count)),
            Property::new("target_count", PropertyValue::Integer(self.target_count)),
            Property::new("max_count", PropertyValue::Integer(self.max_count)),
            Property::new(
                "enable_contextual_count",
                PropertyValue::Flag(self.enable_contextual_count),
            ),
            Property::new("enable_narrow_max", PropertyValue::Flag(self.enable_narrow_max)),
        ]
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        match (name, &value) {
            ("min_count", PropertyValue::Integer(v)) => self.min_count = *v,
            ("target_count", PropertyValue::Integer(v)) => self.target_count = *v,
            ("max_count", PropertyValue::Integer(v)) => self.max_count = *v,
            ("enable_contextual_count", PropertyValue::Flag(v)) => {
                self.enable_contextual_count = *v;
            }
            ("enable_narrow_max", PropertyValue::Flag(v)) => self.enable_narrow_max = *v,
            _ => return Err(property_mismatch(name, &value)),
        }
        Ok(())
    }
}

/// Selects nodes that must always be isolated.
#[derive(Clone)]
pub enum IsolationTarget {
    /// Nodes with exactly this name.
    Name(String),
    /// Nodes whose name starts with this prefix.
    Prefix(String),
    /// Nodes accepted by a custom predicate over the name.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl IsolationTarget {
    /// Whether a node with `name` is selected.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Name(n) => n == name,
            Self::Prefix(p) => name.starts_with(p.as_str()),
            Self::Predicate(f) => f(name),
        }
    }
}

impl fmt::Debug for IsolationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.debug_tuple("Name").field(n).finish(),
            Self::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Everything the optimizer consults besides the tree itself.
///
/// Passed explicitly to every optimization call; there is no global state.
#[derive(Debug, Clone, Default)]
pub struct OptimizationPolicy {
    /// Count thresholds.
    pub settings: ParallelismSettings,
    /// When non-empty, replaces the heuristic: exactly the matching children
    /// are isolated.
    pub explicit_isolation_targets: Vec<IsolationTarget>,
    /// Emit a trace event for every optimized node.
    pub log_optimization: bool,
}

impl OptimizationPolicy {
    /// Policy with the given thresholds and no explicit targets.
    pub fn new(settings: ParallelismSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Adds an explicit isolation target.
    pub fn with_isolation_target(mut self, target: IsolationTarget) -> Self {
        self.explicit_isolation_targets.push(target);
        self
    }

    /// Enables per-node optimization tracing.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_optimization = enabled;
        self
    }

    /// Whether explicit targets override the heuristic.
    pub fn has_explicit_targets(&self) -> bool {
        !self.explicit_isolation_targets.is_empty()
    }

    /// Whether a node named `name` is an explicit isolation target.
    pub fn is_isolation_target(&self, name: &str) -> bool {
        self.explicit_isolation_targets
            .iter()
            .any(|t| t.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let s = ParallelismSettings::default();
        assert_eq!(s.min_count, 256);
        assert_eq!(s.target_count, 131_072);
        assert_eq!(s.max_count, 1_048_576);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let s = ParallelismSettings {
            min_count: 1024,
            target_count: 512,
            ..ParallelismSettings::default()
        };
        assert!(s.validate().unwrap_err().is_validation());
        let zero = ParallelismSettings {
            min_count: 0,
            ..ParallelismSettings::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_editable_roundtrip() {
        let mut s = ParallelismSettings::default();
        s.set_property("enable_contextual_count", PropertyValue::Flag(true))
            .unwrap();
        assert!(s.enable_contextual_count);
        assert_eq!(
            s.property("max_count"),
            Some(PropertyValue::Integer(DEFAULT_MAX_COUNT))
        );
        assert!(s.set_property("max_count", PropertyValue::Flag(true)).is_err());
        assert!(s.set_property("bogus", PropertyValue::Integer(1)).is_err());
    }

    #[test]
    fn test_isolation_targets() {
        let policy = OptimizationPolicy::default()
            .with_isolation_target(IsolationTarget::Name("fft".into()))
            .with_isolation_target(IsolationTarget::Prefix("window".into()))
            .with_isolation_target(IsolationTarget::Predicate(Arc::new(|n| n.ends_with("!"))));
        assert!(policy.has_explicit_targets());
        assert!(policy.is_isolation_target("fft"));
        assert!(!policy.is_isolation_target("fft2"));
        assert!(policy.is_isolation_target("windowHann"));
        assert!(policy.is_isolation_target("sum!"));
        assert!(!OptimizationPolicy::default().is_isolation_target("fft"));
    }
}
