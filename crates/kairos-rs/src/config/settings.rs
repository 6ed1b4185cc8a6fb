//! Loads and validates gateway configuration from the file system.
//!
//! Same environment-variable override, path-traversal guard, and file-size
//! limit a production loader for this shape of document would use.

use std::fs;
use std::path::Path;

use log::debug;

use crate::models::settings::Settings;

const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;

/// Loads configuration from `KAIROS_CONFIG_PATH`, or `./config.json` if
/// unset.
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("KAIROS_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());
    load_settings_from_path(&config_path).map_err(Into::into)
}

/// Loads configuration from an explicit path, applying the same
/// path-traversal and size-limit guards as [`load_settings`]. Used directly
/// by the hot-reload watcher, which already knows its config path.
pub fn load_settings_from_path(config_path: &str) -> Result<Settings, String> {
    debug!("loading configuration from: {config_path}");

    let path = Path::new(config_path);
    if !path.exists() {
        return Err(format!("cannot resolve config path '{config_path}'"));
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("cannot resolve config path '{config_path}': {e}"))?;

    let current_dir =
        std::env::current_dir().map_err(|e| format!("cannot get current directory: {e}"))?;

    if !canonical_path.starts_with(&current_dir) {
        return Err(format!(
            "config path '{config_path}' is outside the working directory"
        ));
    }

    let metadata = fs::metadata(&canonical_path)
        .map_err(|e| format!("cannot read config file metadata: {e}"))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(format!(
            "config file too large: {} bytes (max: {MAX_CONFIG_SIZE} bytes)",
            metadata.len()
        ));
    }

    let config_data = fs::read_to_string(&canonical_path)
        .map_err(|e| format!("cannot read config file: {e}"))?;

    let settings: Settings =
        serde_json::from_str(&config_data).map_err(|e| format!("invalid JSON: {e}"))?;

    settings.validate()?;

    debug!(
        "loaded configuration with {} listener(s)",
        settings.listeners.len()
    );

    Ok(settings)
}
