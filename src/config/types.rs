use mapforge_gdal::request::{DEFAULT_OVERVIEW_LEVELS, DEFAULT_TILE_LEVELS};
use mapforge_gdal::{Resampling, ToolKind, ToolLocator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Directory holding the GDAL executables (default: `bin` next to the
    /// mapforge executable)
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,

    #[serde(default)]
    pub gdal2tiles: Option<PathBuf>,

    #[serde(default)]
    pub gdaladdo: Option<PathBuf>,

    #[serde(default)]
    pub gdal_translate: Option<PathBuf>,

    #[serde(default)]
    pub gdalinfo: Option<PathBuf>,

    /// GDAL support-data directory (default: `<bin_dir>/gdal-data`)
    #[serde(default)]
    pub gdal_data: Option<PathBuf>,

    /// Look tools up on PATH when they are missing from `bin_dir`
    #[serde(default)]
    pub use_path: bool,
}

impl ToolsConfig {
    /// Directory the executables are expected in.
    pub fn resolved_bin_dir(&self) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => expand(dir),
            None => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.join("bin")))
                .unwrap_or_else(|| PathBuf::from("bin")),
        }
    }

    /// Resolve every tool path once. The result is immutable for the rest of
    /// the process.
    pub fn locator(&self) -> ToolLocator {
        let mut locator = ToolLocator::from_bin_dir(self.resolved_bin_dir());

        let overrides = [
            (ToolKind::TileBuilder, &self.gdal2tiles),
            (ToolKind::OverviewBuilder, &self.gdaladdo),
            (ToolKind::FormatTranslator, &self.gdal_translate),
            (ToolKind::InfoReader, &self.gdalinfo),
        ];
        for (kind, path) in overrides {
            if let Some(path) = path {
                locator = locator.with_tool(kind, expand(path));
            }
        }

        if let Some(ref data) = self.gdal_data {
            locator = locator.with_data_dir(expand(data));
        }

        if self.use_path {
            locator = locator.fallback_to_path();
        }

        locator
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub resampling: Resampling,

    #[serde(default = "default_tile_levels")]
    pub tile_levels: String,

    #[serde(default = "default_overview_levels")]
    pub overview_levels: String,
}

fn default_tile_levels() -> String {
    DEFAULT_TILE_LEVELS.to_string()
}

fn default_overview_levels() -> String {
    DEFAULT_OVERVIEW_LEVELS.to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            resampling: Resampling::default(),
            tile_levels: default_tile_levels(),
            overview_levels: default_overview_levels(),
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
