//! Job requests and their validation.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Default zoom range for tile pyramids.
pub const DEFAULT_TILE_LEVELS: &str = "0-16";

/// Default overview decimation factors.
pub const DEFAULT_OVERVIEW_LEVELS: &str = "2 4 8 16";

/// Input extensions accepted by the overview builder.
pub const GEOTIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Input extensions accepted as map files.
pub const MAP_EXTENSIONS: &[&str] = &["tif", "tiff", "jpg", "jpeg", "png", "jp2"];

static ZOOM_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:-(\d+))?$").expect("valid zoom range pattern"));

/// Conversion to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Build a web map tile pyramid.
    Tile,
    /// Copy a GeoTIFF and add internal overviews to the copy.
    Overview,
    /// Convert to an SRTM `.hgt` elevation file.
    Srtm,
}

impl Operation {
    /// Default `levels` string for this operation.
    pub fn default_levels(&self) -> &'static str {
        match self {
            Operation::Tile => DEFAULT_TILE_LEVELS,
            Operation::Overview => DEFAULT_OVERVIEW_LEVELS,
            Operation::Srtm => "",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Tile => "tile",
            Operation::Overview => "overview",
            Operation::Srtm => "srtm",
        };
        f.write_str(name)
    }
}

/// Resampling kernel passed through to the GDAL tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    #[default]
    Average,
    Nearest,
    Bilinear,
    Lanczos,
    Cubic,
    Cubicspline,
}

impl Resampling {
    /// All methods, in the order they are offered to users.
    pub const ALL: [Resampling; 6] = [
        Resampling::Average,
        Resampling::Nearest,
        Resampling::Bilinear,
        Resampling::Lanczos,
        Resampling::Cubic,
        Resampling::Cubicspline,
    ];

    /// Name as understood by `gdal2tiles` and `gdaladdo`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resampling::Average => "average",
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Lanczos => "lanczos",
            Resampling::Cubic => "cubic",
            Resampling::Cubicspline => "cubicspline",
        }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Resampling::ALL
            .iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown resampling method: {}", s))
    }
}

/// A validated zoom range for the tile builder, `N` or `N-M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u32,
    pub max: u32,
}

impl ZoomRange {
    /// Parse `N` or `N-M`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for anything else, including `N-M` with
    /// `N > M`.
    pub fn parse(levels: &str) -> Result<Self> {
        let levels = levels.trim();
        let caps = ZOOM_RANGE.captures(levels).ok_or_else(|| {
            Error::validation(format!(
                "zoom levels must look like 'N' or 'N-M' (e.g. '0-16'), got '{}'",
                levels
            ))
        })?;

        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| Error::validation(format!("zoom level out of range: '{}'", s)))
        };
        let min = parse(&caps[1])?;
        let max = match caps.get(2) {
            Some(m) => parse(m.as_str())?,
            None => min,
        };

        if min > max {
            return Err(Error::validation(format!(
                "zoom range '{}' starts above its end",
                levels
            )));
        }

        Ok(Self { min, max })
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// Parse whitespace-separated positive integers, e.g. `2 4 8 16`.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the list is empty or any token is not a
/// positive integer.
pub fn parse_overview_levels(levels: &str) -> Result<Vec<u32>> {
    let parsed = levels
        .split_whitespace()
        .map(|token| match token.parse::<u32>() {
            Ok(level) if level > 0 => Ok(level),
            _ => Err(Error::validation(format!(
                "overview levels must be space-separated positive integers (e.g. '2 4 8 16'), got '{}'",
                token
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    if parsed.is_empty() {
        return Err(Error::validation("at least one overview level is required"));
    }

    Ok(parsed)
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// One conversion job, built from user input immediately before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub operation: Operation,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Zoom range for [`Operation::Tile`], overview factors for
    /// [`Operation::Overview`], ignored for [`Operation::Srtm`].
    pub levels: String,
    pub resampling: Resampling,
}

impl JobRequest {
    /// Create a request with the operation's default levels and `average`
    /// resampling.
    pub fn new(
        operation: Operation,
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            operation,
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            levels: operation.default_levels().to_string(),
            resampling: Resampling::default(),
        }
    }

    /// Set the levels string.
    pub fn with_levels(mut self, levels: impl Into<String>) -> Self {
        self.levels = levels.into();
        self
    }

    /// Set the resampling method.
    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    /// Input file name without extension.
    pub fn input_stem(&self) -> Result<String> {
        self.input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::validation(format!(
                    "input path has no file name: {}",
                    self.input_path.display()
                ))
            })
    }

    /// Check everything that can be checked without launching a process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !self.input_path.is_file() {
            return Err(Error::validation(format!(
                "input file does not exist: {}",
                self.input_path.display()
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(Error::validation(format!(
                "output directory does not exist: {}",
                self.output_dir.display()
            )));
        }
        self.input_stem()?;

        match self.operation {
            Operation::Tile => {
                ZoomRange::parse(&self.levels)?;
            }
            Operation::Overview => {
                if !has_extension(&self.input_path, GEOTIFF_EXTENSIONS) {
                    return Err(Error::validation(format!(
                        "overviews require a GeoTIFF (.tif/.tiff) input, got {}",
                        self.input_path.display()
                    )));
                }
                parse_overview_levels(&self.levels)?;
            }
            Operation::Srtm => {}
        }

        Ok(())
    }
}
