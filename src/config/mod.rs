mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./marquee.toml",
        "~/.config/marquee/config.toml",
        "/etc/marquee/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.cache.failure_ttl_secs == 0 {
        anyhow::bail!("cache.failure_ttl_secs must be greater than 0");
    }

    if config.cache.unavailable_ttl_secs == Some(0) {
        anyhow::bail!("cache.unavailable_ttl_secs must be greater than 0");
    }

    if config.tmdb.language.trim().is_empty() {
        anyhow::bail!("tmdb.language cannot be empty");
    }

    if !config.tmdb.is_enabled() {
        tracing::warn!("No TMDB API key configured; movie and show lookups are disabled");
    }

    Ok(())
}
