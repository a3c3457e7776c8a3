//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use tessera_config::CompilerConfig;
use tessera_core::{CompilationStrategy, CompileOptions};

/// Load the configuration named on the command line, or the user config.
///
/// An explicit path must exist; the user config falls back to defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CompilerConfig> {
    let config = match path {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::load_or_default()?,
    };
    Ok(config)
}

/// Compile options from `config`, with an optional strategy override.
pub fn compile_options(
    config: &CompilerConfig,
    strategy: Option<CompilationStrategy>,
) -> anyhow::Result<CompileOptions> {
    let mut options = config.compile_options()?;
    if let Some(strategy) = strategy {
        options.strategy = strategy;
    }
    Ok(options)
}
