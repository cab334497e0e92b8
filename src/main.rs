mod cli;

use mapforge::{config, shell};
use mapforge_gdal::{stats, ConversionJobRunner, Operation};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, JobArgs};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mapforge=debug,mapforge_gdal=debug".to_string()
        } else {
            "mapforge=warn,mapforge_gdal=warn".to_string()
        }
    });

    // Tool output goes to stdout; keep logs out of its way.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Tiles {
            job,
            zoom,
            resampling,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let levels = zoom.unwrap_or_else(|| config.defaults.tile_levels.clone());
            let resampling = resampling.unwrap_or(config.defaults.resampling);
            run_conversion(&config, Operation::Tile, &job, &levels, resampling)
        }
        Commands::Overviews {
            job,
            levels,
            resampling,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let levels = levels.unwrap_or_else(|| config.defaults.overview_levels.clone());
            let resampling = resampling.unwrap_or(config.defaults.resampling);
            run_conversion(&config, Operation::Overview, &job, &levels, resampling)
        }
        Commands::Srtm { job } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let resampling = config.defaults.resampling;
            run_conversion(&config, Operation::Srtm, &job, "", resampling)
        }
        Commands::Stats { folder, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            elevation_stats(&config, &folder, json)
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mapforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_conversion(
    config: &config::Config,
    operation: Operation,
    job: &JobArgs,
    levels: &str,
    resampling: mapforge_gdal::Resampling,
) -> Result<()> {
    let request = shell::build_request(
        operation,
        &job.input,
        job.output.as_deref(),
        levels,
        resampling,
    )?;

    let runner = ConversionJobRunner::new(config.tools.locator());
    tracing::debug!("GDAL_DATA = {:?}", runner.tools().data_dir());

    if job.dry_run {
        return shell::dry_run(&runner, &request);
    }

    shell::run_job(&runner, request, job.json)
}

fn elevation_stats(config: &config::Config, folder: &Path, json: bool) -> Result<()> {
    if !folder.is_dir() {
        anyhow::bail!("Folder does not exist: {:?}", folder);
    }

    let tools = config.tools.locator();
    let results = stats::scan_folder(&tools, folder)?;
    if results.is_empty() && !json {
        println!("No .hgt files found in {}", folder.display());
        return Ok(());
    }

    shell::print_stats(&results, json)
}

fn check_tools(config: &config::Config) -> Result<()> {
    println!("Checking GDAL tools...\n");

    let tools = config.tools.locator();
    let mut all_ok = true;

    for tool in tools.check() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };
        println!("{} {} - {}", status, tool.kind, tool.path.display());
    }

    let data_dir = tools.data_dir();
    let data_status = if data_dir.is_dir() { "✓" } else { "✗" };
    println!("{} GDAL_DATA - {}", data_status, data_dir.display());

    println!();
    if all_ok {
        println!("All GDAL tools are available!");
    } else {
        println!(
            "Some tools are missing. Set [tools] bin_dir or per-tool paths in the config file."
        );
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?;
        }
        None => {
            println!("Validating default config");
            config::load_config_or_default(None)?;
        }
    }

    println!("Configuration is valid!");
    Ok(())
}
