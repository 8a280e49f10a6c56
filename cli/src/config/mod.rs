//! Configuration management for graph-cli.
//!
//! Built-in defaults, then the base file, then an optional `*.local.toml`
//! overlay beside it, then `GRAPH_*` environment variables.

pub mod paths;
pub mod settings;

pub use paths::config_file;
pub use settings::{ApiConfig, AuthConfig, GraphConfig};

use std::path::Path;

use toml::Value;

use crate::error::{GraphError, Result};

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<GraphConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path plus its local overlay.
///
/// Missing files are skipped.
pub fn load_config_from(path: &Path) -> Result<GraphConfig> {
    Ok(load_files(path)?.with_env_overrides())
}

/// Merge the base file and its overlay over the defaults, without env overrides.
fn load_files(path: &Path) -> Result<GraphConfig> {
    let mut merged = Value::Table(toml::Table::new());

    for file in [path.to_path_buf(), paths::local_overlay(path)] {
        if !file.exists() {
            continue;
        }

        let contents = std::fs::read_to_string(&file)?;
        let layer: Value = toml::from_str(&contents)
            .map_err(|e| GraphError::ConfigRead(format!("{}: {e}", file.display())))?;
        tracing::debug!(path = %file.display(), "loaded config layer");
        merge(&mut merged, layer);
    }

    merged
        .try_into()
        .map_err(|e: toml::de::Error| GraphError::ConfigRead(e.to_string()))
}

/// Deep-merge `overlay` into `base`; tables merge key by key, anything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
