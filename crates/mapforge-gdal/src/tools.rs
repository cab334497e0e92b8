//! External tool location and detection.

use crate::{Error, Result, ToolCommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable GDAL reads to find its projection and datum resources.
pub const GDAL_DATA_ENV: &str = "GDAL_DATA";

/// Name of the support-data directory expected next to the executables.
pub const GDAL_DATA_DIR: &str = "gdal-data";

/// Logical external tools the runner knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Web map tile pyramid builder (`gdal2tiles`).
    TileBuilder,
    /// Internal overview builder (`gdaladdo`).
    OverviewBuilder,
    /// Format translator (`gdal_translate`).
    FormatTranslator,
    /// Raster info reader (`gdalinfo`).
    InfoReader,
}

impl ToolKind {
    /// All tools, in display order.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::TileBuilder,
        ToolKind::OverviewBuilder,
        ToolKind::FormatTranslator,
        ToolKind::InfoReader,
    ];

    /// Executable base name without platform suffix.
    pub fn program_name(&self) -> &'static str {
        match self {
            ToolKind::TileBuilder => "gdal2tiles",
            ToolKind::OverviewBuilder => "gdaladdo",
            ToolKind::FormatTranslator => "gdal_translate",
            ToolKind::InfoReader => "gdalinfo",
        }
    }

    /// Executable file name on the current platform.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.program_name(), std::env::consts::EXE_SUFFIX)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program_name())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches(".exe") {
            "gdal2tiles" | "gdal2tiles.py" => Ok(ToolKind::TileBuilder),
            "gdaladdo" => Ok(ToolKind::OverviewBuilder),
            "gdal_translate" => Ok(ToolKind::FormatTranslator),
            "gdalinfo" => Ok(ToolKind::InfoReader),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}

/// Resolved executable paths for every [`ToolKind`] plus the GDAL support-data
/// directory.
///
/// Built once at startup and never mutated afterwards; the runner only reads
/// from it.
///
/// # Example
///
/// ```
/// use mapforge_gdal::{ToolKind, ToolLocator};
///
/// let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");
/// assert!(tools.path(ToolKind::OverviewBuilder).starts_with("/opt/gdal/bin"));
/// assert!(tools.data_dir().ends_with("gdal-data"));
/// ```
#[derive(Debug, Clone)]
pub struct ToolLocator {
    paths: BTreeMap<ToolKind, PathBuf>,
    data_dir: PathBuf,
}

impl ToolLocator {
    /// Lay out every tool directly inside `bin_dir`, with support data in
    /// `<bin_dir>/gdal-data`.
    pub fn from_bin_dir(bin_dir: impl AsRef<Path>) -> Self {
        let bin_dir = bin_dir.as_ref();
        let paths = ToolKind::ALL
            .iter()
            .map(|kind| (*kind, bin_dir.join(kind.file_name())))
            .collect();

        Self {
            paths,
            data_dir: bin_dir.join(GDAL_DATA_DIR),
        }
    }

    /// Override the path of a single tool.
    pub fn with_tool(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(kind, path.into());
        self
    }

    /// Override the support-data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Replace every tool that is missing at its configured path with the
    /// first match on `PATH`, if any.
    pub fn fallback_to_path(mut self) -> Self {
        for (kind, path) in self.paths.iter_mut() {
            if path.is_file() {
                continue;
            }
            if let Ok(found) = which::which(kind.program_name()) {
                *path = found;
            }
        }
        self
    }

    /// Configured path of a tool.
    pub fn path(&self, kind: ToolKind) -> &Path {
        // Every constructor fills all kinds.
        &self.paths[&kind]
    }

    /// GDAL support-data directory injected as `GDAL_DATA`.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Environment overrides applied to every invocation.
    pub fn env_overrides(&self) -> Vec<(String, PathBuf)> {
        vec![(GDAL_DATA_ENV.to_string(), self.data_dir.clone())]
    }

    /// Start a command for a tool with the environment overrides applied.
    pub fn command(&self, kind: ToolKind) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.path(kind).to_path_buf());
        for (key, value) in self.env_overrides() {
            cmd.env(key, value);
        }
        cmd
    }

    /// Require that a tool exists at its configured path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] naming the expected path.
    pub fn require(&self, kind: ToolKind) -> Result<&Path> {
        let path = self.path(kind);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::tool_not_found(kind.program_name(), path))
        }
    }

    /// Report the availability of every tool.
    pub fn check(&self) -> Vec<ToolInfo> {
        ToolKind::ALL
            .iter()
            .map(|kind| {
                let path = self.path(*kind).to_path_buf();
                ToolInfo {
                    kind: *kind,
                    available: path.is_file(),
                    path,
                }
            })
            .collect()
    }
}

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Which tool.
    pub kind: ToolKind,
    /// Whether the executable exists at its configured path.
    pub available: bool,
    /// Configured path to the executable.
    pub path: PathBuf,
}
