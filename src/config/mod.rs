mod types;

pub use types::*;

use anyhow::{Context, Result};
use mapforge_gdal::request::parse_overview_levels;
use mapforge_gdal::ZoomRange;
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

    let default_paths = ["./mapforge.toml", "~/.config/mapforge/config.toml"];

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
    ZoomRange::parse(&config.defaults.tile_levels).context("Invalid defaults.tile_levels")?;
    parse_overview_levels(&config.defaults.overview_levels)
        .context("Invalid defaults.overview_levels")?;

    if let Some(ref dir) = config.tools.bin_dir {
        if !dir.exists() {
            tracing::warn!("Tool directory does not exist: {:?}", dir);
        }
    }

    Ok(())
}
