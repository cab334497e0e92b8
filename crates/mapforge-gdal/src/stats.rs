//! Elevation statistics for folders of SRTM `.hgt` tiles.
//!
//! `gdalinfo -stats` prints free-form text; only the two `KEY=VALUE` lines we
//! need are picked out by substring match.

use crate::{Error, Result, ToolKind, ToolLocator};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

const MINIMUM_KEY: &str = "STATISTICS_MINIMUM=";
const MAXIMUM_KEY: &str = "STATISTICS_MAXIMUM=";

/// Min/max values reported for one file. Values are kept as printed by GDAL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElevationStats {
    pub min: Option<String>,
    pub max: Option<String>,
}

impl ElevationStats {
    /// Scan `gdalinfo` output for the statistics keys. The last occurrence of
    /// each key wins.
    pub fn from_gdalinfo(output: &str) -> Self {
        let mut stats = Self::default();
        for line in output.lines() {
            let line = line.trim();
            if line.contains(MINIMUM_KEY) {
                stats.min = value_after_eq(line);
            }
            if line.contains(MAXIMUM_KEY) {
                stats.max = value_after_eq(line);
            }
        }
        stats
    }
}

fn value_after_eq(line: &str) -> Option<String> {
    line.split('=').nth(1).map(|v| v.trim().to_string())
}

fn fmt_value(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

impl fmt::Display for ElevationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min={}, max={}", fmt_value(&self.min), fmt_value(&self.max))
    }
}

/// Statistics for one file of a folder scan.
#[derive(Debug)]
pub struct FileStats {
    pub path: PathBuf,
    pub stats: Result<ElevationStats>,
}

impl FileStats {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// `.hgt` files directly inside `folder`, sorted by name.
pub fn find_hgt_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).map_err(|e| {
        Error::validation(format!("cannot read folder {}: {}", folder.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_hgt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("hgt"));
        if is_hgt && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run `gdalinfo -stats` on one file.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if `gdalinfo` is missing and
/// [`Error::ToolFailed`] if it exits non-zero.
pub fn read_stats(tools: &ToolLocator, file: &Path) -> Result<ElevationStats> {
    let gdalinfo = tools.require(ToolKind::InfoReader)?;

    let mut cmd = tools.command(ToolKind::InfoReader);
    cmd.arg("-stats").arg(file);

    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(ToolKind::InfoReader.program_name(), gdalinfo)
        } else {
            Error::Unexpected(format!("failed to launch gdalinfo: {}", e))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed(
            ToolKind::InfoReader.program_name(),
            output.status.code(),
            stderr.trim(),
        ));
    }

    Ok(ElevationStats::from_gdalinfo(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

/// Read statistics for every `.hgt` file in `folder`. A failure on one file
/// is recorded in its entry and the scan goes on.
pub fn scan_folder(tools: &ToolLocator, folder: &Path) -> Result<Vec<FileStats>> {
    let files = find_hgt_files(folder)?;

    #[cfg(feature = "tracing")]
    tracing::info!("Reading statistics for {} .hgt files in {}", files.len(), folder.display());

    Ok(files
        .into_iter()
        .map(|path| {
            let stats = read_stats(tools, &path);
            FileStats { path, stats }
        })
        .collect())
}
