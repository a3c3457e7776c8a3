//! Compiler configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tessera_core::{
    CompilationStrategy, CompileOptions, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_COUNT,
    DEFAULT_MIN_COUNT, DEFAULT_TARGET_COUNT, IsolationTarget, OptimizationPolicy,
    ParallelismSettings,
};

use crate::error::ConfigError;
use crate::paths::{ensure_dir, user_config_path};

/// Optimizer thresholds and kernel compilation options.
///
/// # TOML Format
///
/// ```toml
/// [parallelism]
/// min_count = 256
/// target_count = 131072
/// max_count = 1048576
/// enable_contextual_count = false
/// enable_narrow_max = true
///
/// [isolation]
/// names = ["cos"]
/// prefixes = ["fft"]
/// log_optimization = false
///
/// [compile]
/// strategy = "recursive"
/// max_call_depth = 256
/// ```
///
/// Every table and field is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Count thresholds for the inline-or-isolate decision.
    pub parallelism: ParallelismConfig,

    /// Explicit isolation targets.
    pub isolation: IsolationConfig,

    /// Kernel compilation options.
    pub compile: CompileConfig,
}

/// `[parallelism]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParallelismConfig {
    /// Floor for a worthwhile kernel size.
    pub min_count: u64,
    /// Soft ceiling used by narrow-max mode.
    pub target_count: u64,
    /// Hard ceiling.
    pub max_count: u64,
    /// Inline when the enclosing context already covers the largest child.
    pub enable_contextual_count: bool,
    /// Inline children above `target_count` once the context reaches `min_count`.
    pub enable_narrow_max: bool,
}

impl Default for ParallelismConfig {
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

/// `[isolation]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IsolationConfig {
    /// Node names that are always isolated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// Node name prefixes that are always isolated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<String>,
    /// Trace every optimized node.
    pub log_optimization: bool,
}

/// `[compile]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompileConfig {
    /// `recursive` or `unrolled`.
    pub strategy: String,
    /// Nested call limit for the host executor.
    pub max_call_depth: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            strategy: CompilationStrategy::default().as_str().to_string(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl CompilerConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_dir(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::debug!("config: saved {}", path.display());
        Ok(())
    }

    /// Load the user configuration, or defaults when the file does not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_or_default_from(user_config_path())
    }

    /// Load `path`, or defaults when it does not exist.
    pub fn load_or_default_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("config: {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Checks threshold ordering, the strategy name and the call depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parallelism_settings().validate()?;
        self.strategy()?;
        if self.compile.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_call_depth must be positive".to_string(),
            ));
        }
        if let Some(empty) = self
            .isolation
            .names
            .iter()
            .chain(&self.isolation.prefixes)
            .find(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "isolation target '{empty}' is blank"
            )));
        }
        Ok(())
    }

    /// The configured compilation strategy.
    pub fn strategy(&self) -> Result<CompilationStrategy, ConfigError> {
        Ok(self.compile.strategy.parse()?)
    }

    /// Thresholds as the optimizer's settings struct.
    pub fn parallelism_settings(&self) -> ParallelismSettings {
        let p = &self.parallelism;
        ParallelismSettings {
            min_count: p.min_count,
            target_count: p.target_count,
            max_count: p.max_count,
            enable_contextual_count: p.enable_contextual_count,
            enable_narrow_max: p.enable_narrow_max,
        }
    }

    /// The optimization policy described by this configuration.
    pub fn to_policy(&self) -> OptimizationPolicy {
        let names = self.isolation.names.iter().cloned().map(IsolationTarget::Name);
        let prefixes = self
            .isolation
            .prefixes
            .iter()
            .cloned()
            .map(IsolationTarget::Prefix);
        names
            .chain(prefixes)
            .fold(
                OptimizationPolicy::new(self.parallelism_settings()),
                OptimizationPolicy::with_isolation_target,
            )
            .with_logging(self.isolation.log_optimization)
    }

    /// Compile options for producers built under this configuration.
    pub fn compile_options(&self) -> Result<CompileOptions, ConfigError> {
        Ok(CompileOptions {
            strategy: self.strategy()?,
            max_call_depth: self.compile.max_call_depth,
        })
    }
}
