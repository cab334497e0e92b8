use clap::{Args, Parser, Subcommand};
use mapforge_gdal::Resampling;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mapforge")]
#[command(author, version, about = "Raster map conversion with the GDAL command-line tools")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every conversion command.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Input map file (GeoTIFF, JPEG, PNG, JPEG2000)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Base output directory (defaults to the input file's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the commands that would run without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a web map tile pyramid (creates <name>_tiles in the output directory)
    Tiles {
        #[command(flatten)]
        job: JobArgs,

        /// Zoom levels, e.g. 0-16 or 12
        #[arg(short = 'z', long)]
        zoom: Option<String>,

        /// Resampling method
        #[arg(short, long)]
        resampling: Option<Resampling>,
    },

    /// Add internal overviews to a new GeoTIFF copy (<name>_with_overviews.tif)
    Overviews {
        #[command(flatten)]
        job: JobArgs,

        /// Overview levels, e.g. "2 4 8 16"
        #[arg(short, long)]
        levels: Option<String>,

        /// Resampling method
        #[arg(short, long)]
        resampling: Option<Resampling>,
    },

    /// Convert to an SRTM elevation file (<name>.hgt)
    Srtm {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Print min/max elevation of every .hgt file in a folder
    Stats {
        /// Folder containing .hgt files
        #[arg(required = true)]
        folder: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured GDAL tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
