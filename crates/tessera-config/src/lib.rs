//! Configuration for the tessera optimizer and kernel compiler.
//!
//! A single TOML file carries the optimizer's count thresholds, explicit
//! isolation targets and the kernel compilation strategy. [`CompilerConfig`]
//! loads and validates it and converts it into the plain structs that
//! `tessera-core` consumes ([`OptimizationPolicy`](tessera_core::OptimizationPolicy)
//! and [`CompileOptions`](tessera_core::CompileOptions)).
//!
//! # Example
//!
//! ```rust,no_run
//! use tessera_config::CompilerConfig;
//!
//! // Defaults when ~/.config/tessera/compiler.toml does not exist
//! let config = CompilerConfig::load_or_default().unwrap();
//! let policy = config.to_policy();
//! let options = config.compile_options().unwrap();
//! println!("{:?} {:?}", policy.settings, options.strategy);
//! ```

mod compiler;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use compiler::{CompileConfig, CompilerConfig, IsolationConfig, ParallelismConfig};
pub use error::ConfigError;
pub use paths::{CONFIG_FILE_NAME, ensure_dir, user_config_dir, user_config_path};
