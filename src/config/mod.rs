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
        "./clipshrink.toml",
        "./config.toml",
        "~/.config/clipshrink/config.toml",
        "/etc/clipshrink/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }
    if config.server.max_upload_mb == 0 {
        anyhow::bail!("server.max_upload_mb must be greater than 0");
    }

    if config.jobs.retention_secs == 0 {
        anyhow::bail!("jobs.retention_secs must be greater than 0");
    }
    if config.jobs.sweep_interval_secs == 0 {
        anyhow::bail!("jobs.sweep_interval_secs must be greater than 0");
    }
    if config.jobs.max_concurrent == Some(0) {
        anyhow::bail!("jobs.max_concurrent must be greater than 0 when set");
    }

    for (name, path) in [
        ("ffmpeg", &config.encoder.ffmpeg_path),
        ("ffprobe", &config.encoder.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
