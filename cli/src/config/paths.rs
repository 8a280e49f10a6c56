//! Platform-specific path utilities for graph-cli.

use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};

/// Get the configuration directory for graph-cli.
///
/// - Linux: `~/.config/graph-cli`
/// - macOS: `~/Library/Application Support/graph-cli`
/// - Windows: `%APPDATA%\graph-cli`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| GraphError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("graph-cli"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// The machine-local overlay next to `base`: `config.toml` becomes `config.local.toml`.
pub fn local_overlay(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .map_or_else(|| "config".into(), |s| s.to_string_lossy());
    base.with_file_name(format!("{stem}.local.toml"))
}
