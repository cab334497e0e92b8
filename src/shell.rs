//! Terminal front-end for conversion jobs.
//!
//! Checks user input, submits one job at a time, prints tool output as it
//! arrives and turns the final result into a message and exit status.

use anyhow::{bail, Result};
use mapforge_gdal::request::{has_extension, MAP_EXTENSIONS};
use mapforge_gdal::stats::FileStats;
use mapforge_gdal::{
    ConversionJobRunner, ElevationStats, JobEvent, JobRequest, JobResult, Operation, Resampling,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Build a request from command-line input.
///
/// The input must exist and look like a map file; the output directory
/// defaults to the input's directory.
pub fn build_request(
    operation: Operation,
    input: &Path,
    output: Option<&Path>,
    levels: &str,
    resampling: Resampling,
) -> Result<JobRequest> {
    if !input.is_file() {
        bail!("Input file does not exist: {:?}", input);
    }
    if !has_extension(input, MAP_EXTENSIONS) {
        bail!(
            "Unsupported input file {:?} (expected one of: {})",
            input,
            MAP_EXTENSIONS.join(", ")
        );
    }

    let output_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if !output_dir.is_dir() {
        bail!("Output directory does not exist: {:?}", output_dir);
    }

    Ok(JobRequest::new(operation, input, output_dir)
        .with_levels(levels)
        .with_resampling(resampling))
}

/// Serializable view of a [`JobResult`].
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub operation: Operation,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl From<&JobResult> for ResultSummary {
    fn from(result: &JobResult) -> Self {
        Self {
            operation: result.operation,
            success: result.is_success(),
            result_path: result.result_path().map(Path::to_path_buf),
            exit_code: result.exit_code(),
            error_kind: result.error().map(|e| e.kind()),
            diagnostic: result.diagnostic(),
        }
    }
}

/// Success message shown for a finished job.
pub fn success_message(operation: Operation, path: &Path) -> String {
    match operation {
        Operation::Tile => format!("Tiles created in: {}", path.display()),
        Operation::Overview => {
            format!("Internal overviews added to new GeoTIFF: {}", path.display())
        }
        Operation::Srtm => format!("SRTM elevation file written to: {}", path.display()),
    }
}

/// Print the planned commands without running anything.
pub fn dry_run(runner: &ConversionJobRunner, request: &JobRequest) -> Result<()> {
    let plan = runner.plan(request)?;
    for step in &plan.steps {
        println!("{}", step.command);
    }
    println!("\n[DRY RUN] Result would be: {}", plan.result_path.display());
    Ok(())
}

/// Run a job, printing progress as it arrives.
///
/// Ctrl-C cancels the job. Tools run in their own process group, so the
/// terminal's interrupt does not reach them directly.
pub fn run_job(runner: &ConversionJobRunner, request: JobRequest, json: bool) -> Result<()> {
    tracing::info!("Starting {} job for {:?}", request.operation, request.input_path);

    let stream = runner.submit(request);
    let handle = stream.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        handle.cancel();
    }) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let result = stream.run(|event| match event {
        JobEvent::StepStarted { command_line, .. } => {
            if !json {
                println!("Running command:\n{}\n", command_line);
            }
        }
        JobEvent::Output(line) => {
            if !json {
                println!("{}", line.text);
            }
        }
        JobEvent::Finished(_) => {}
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&ResultSummary::from(&result))?);
    }

    match result.outcome {
        Ok(ref path) => {
            if !json {
                println!("\n{}", success_message(result.operation, path));
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!("{} job failed: {}", result.operation, e.kind());
            Err(anyhow::Error::new(e).context(format!("{} conversion failed", result.operation)))
        }
    }
}

#[derive(Debug, Serialize)]
struct StatsLine<'a> {
    file: String,
    #[serde(flatten)]
    stats: Option<&'a ElevationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print one line per file: `name: min=…, max=…` or an error line.
pub fn print_stats(results: &[FileStats], json: bool) -> Result<()> {
    if json {
        let lines: Vec<StatsLine> = results
            .iter()
            .map(|r| StatsLine {
                file: r.file_name(),
                stats: r.stats.as_ref().ok(),
                error: r.stats.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    for result in results {
        match &result.stats {
            Ok(stats) => println!("{}: {}", result.file_name(), stats),
            Err(e) => println!("[ERROR] Failed to process {}: {}", result.file_name(), e),
        }
    }
    Ok(())
}
