// ABOUTME: Loads scrape configurations from JSON text or files.
// ABOUTME: Parse and validation failures both surface as configuration errors.

//! Scrape configuration loader.

use std::fs;
use std::path::Path;

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;

/// Parses and validates a configuration from JSON text.
pub fn load_config_str(json: &str) -> Result<ScrapeConfig, ScrapeError> {
    let config: ScrapeConfig = serde_json::from_str(json)
        .map_err(|e| ScrapeError::config("LoadConfig", format!("invalid configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a configuration file.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<ScrapeConfig, ScrapeError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| {
        ScrapeError::config(
            "LoadConfig",
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;
    load_config_str(&json)
}
