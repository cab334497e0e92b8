//! # mapforge-gdal
//!
//! Supervised execution of GDAL command-line tools for raster map conversion.
//!
//! This crate does no raster processing itself. It provides:
//! - Validation of conversion requests (zoom ranges, overview levels, input types)
//! - Construction of `gdal2tiles`, `gdal_translate` and `gdaladdo` invocations
//! - A job runner that streams combined tool output line by line and maps
//!   exit codes to outcomes, with cancellation
//! - Min/max elevation statistics for folders of `.hgt` files via `gdalinfo`
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use mapforge_gdal::{ConversionJobRunner, JobEvent, JobRequest, Operation, ToolLocator};
//!
//! let runner = ConversionJobRunner::new(ToolLocator::from_bin_dir("/opt/gdal/bin"));
//! let request = JobRequest::new(Operation::Srtm, "/maps/N31E034.tif", "/maps");
//!
//! let result = runner.submit(request).run(|event| {
//!     if let JobEvent::Output(line) = event {
//!         println!("{}", line.text);
//!     }
//! });
//! println!("{:?}", result.result_path());
//! ```

mod command;
mod error;
pub mod plan;
pub mod request;
pub mod runner;
pub mod stats;
pub mod tools;

// Re-exports
pub use command::ToolCommand;
pub use error::{Error, Result};
pub use plan::{JobPlan, PlannedStep};
pub use request::{JobRequest, Operation, Resampling, ZoomRange};
pub use runner::{CancelHandle, ConversionJobRunner, JobEvent, JobResult, JobStream, ProgressLine};
pub use stats::{ElevationStats, FileStats};
pub use tools::{ToolInfo, ToolKind, ToolLocator};
