//! Platform-specific location of the compiler configuration.
//!
//! - Linux: `~/.config/tessera/compiler.toml`
//! - macOS: `~/Library/Application Support/tessera/compiler.toml`
//! - Windows: `%APPDATA%\tessera\compiler.toml`

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "tessera";

/// File name of the compiler configuration.
pub const CONFIG_FILE_NAME: &str = "compiler.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the current directory if the platform config directory
/// cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the user's compiler configuration file.
pub fn user_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Creates `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }
    Ok(())
}
