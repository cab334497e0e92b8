//! Mapforge - raster map conversion front-end for the GDAL tools
//!
//! This library crate exposes the shell and configuration for integration testing.

pub mod config;
pub mod shell;
