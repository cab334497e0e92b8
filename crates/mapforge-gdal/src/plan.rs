//! Translation of a [`JobRequest`] into concrete tool invocations.

use crate::request::{parse_overview_levels, ZoomRange};
use crate::{JobRequest, Operation, Result, ToolCommand, ToolKind, ToolLocator};
use std::path::PathBuf;

/// Suffix of the tile directory created next to the input's name.
pub const TILES_SUFFIX: &str = "_tiles";

/// Suffix of the GeoTIFF copy that receives overviews.
pub const OVERVIEWS_SUFFIX: &str = "_with_overviews.tif";

/// One invocation within a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub tool: ToolKind,
    pub command: ToolCommand,
}

/// Ordered invocations for a job plus the path produced on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub operation: Operation,
    pub steps: Vec<PlannedStep>,
    pub result_path: PathBuf,
}

impl JobPlan {
    /// Validate `request` and build its invocations.
    ///
    /// Nothing is launched and no file is touched. Tool existence is not
    /// checked here; see [`JobPlan::require_tools`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for a malformed request.
    pub fn build(request: &JobRequest, tools: &ToolLocator) -> Result<Self> {
        request.validate()?;

        let stem = request.input_stem()?;
        let (steps, result_path) = match request.operation {
            Operation::Tile => {
                ZoomRange::parse(&request.levels)?;
                let tiles_dir = request.output_dir.join(format!("{}{}", stem, TILES_SUFFIX));

                let mut cmd = tools.command(ToolKind::TileBuilder);
                cmd.args(["-p", "raster", "-z"])
                    .arg(request.levels.trim())
                    .arg(format!("--resampling={}", request.resampling))
                    .arg(&request.input_path)
                    .arg(&tiles_dir);

                (vec![step(ToolKind::TileBuilder, cmd)], tiles_dir)
            }
            Operation::Overview => {
                let levels = parse_overview_levels(&request.levels)?;
                let copy = request.output_dir.join(format!("{}{}", stem, OVERVIEWS_SUFFIX));

                let mut translate = tools.command(ToolKind::FormatTranslator);
                translate.arg(&request.input_path).arg(&copy);

                let mut addo = tools.command(ToolKind::OverviewBuilder);
                addo.arg("-r")
                    .arg(request.resampling.as_str())
                    .arg(&copy)
                    .args(levels.iter().map(|l| l.to_string()));

                (
                    vec![
                        step(ToolKind::FormatTranslator, translate),
                        step(ToolKind::OverviewBuilder, addo),
                    ],
                    copy,
                )
            }
            Operation::Srtm => {
                let hgt = request.output_dir.join(format!("{}.hgt", stem));

                let mut cmd = tools.command(ToolKind::FormatTranslator);
                cmd.args(["-of", "SRTMHGT"])
                    .arg(&request.input_path)
                    .arg(&hgt);

                (vec![step(ToolKind::FormatTranslator, cmd)], hgt)
            }
        };

        Ok(Self {
            operation: request.operation,
            steps,
            result_path,
        })
    }

    /// Check that every executable of the plan exists before anything runs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ToolNotFound`] for the first missing tool.
    pub fn require_tools(&self, tools: &ToolLocator) -> Result<()> {
        for step in &self.steps {
            tools.require(step.tool)?;
        }
        Ok(())
    }
}

fn step(tool: ToolKind, command: ToolCommand) -> PlannedStep {
    PlannedStep { tool, command }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Resampling};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn fixture(name: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let input = dir.path().join(name);
        std::fs::write(&input, b"raster").unwrap();
        (dir, input)
    }

    #[test]
    fn test_tile_plan_targets_tiles_subfolder() {
        let (dir, input) = fixture("israel.tif");
        let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");
        let request = JobRequest::new(Operation::Tile, &input, dir.path())
            .with_levels("3-12")
            .with_resampling(Resampling::Lanczos);

        let plan = JobPlan::build(&request, &tools).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.result_path, dir.path().join("israel_tiles"));

        let args = plan.steps[0].command.arg_strings();
        let z = args.iter().position(|a| a == "-z").unwrap();
        assert_eq!(args[z + 1], "3-12");
        assert!(args.contains(&"--resampling=lanczos".to_string()));
        assert_eq!(args[..2], ["-p", "raster"]);
        assert_eq!(args.last().unwrap(), &plan.result_path.display().to_string());
        assert!(!plan.result_path.exists());
    }

    #[test]
    fn test_tile_zoom_is_passed_as_given() {
        let (dir, input) = fixture("israel.tif");
        let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");

        for (levels, expected) in [("05-12", "05-12"), ("3-3", "3-3"), (" 7 ", "7")] {
            let request = JobRequest::new(Operation::Tile, &input, dir.path()).with_levels(levels);
            let plan = JobPlan::build(&request, &tools).unwrap();
            let args = plan.steps[0].command.arg_strings();
            let z = args.iter().position(|a| a == "-z").unwrap();
            assert_eq!(args[z + 1], expected);
        }
    }

    #[test]
    fn test_overview_plan_copies_then_adds_levels() {
        let (dir, input) = fixture("dtm.TIFF");
        let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");
        let request = JobRequest::new(Operation::Overview, &input, dir.path())
            .with_levels("2 4 8")
            .with_resampling(Resampling::Nearest);

        let plan = JobPlan::build(&request, &tools).unwrap();
        let copy = dir.path().join("dtm_with_overviews.tif");
        assert_eq!(plan.result_path, copy);

        assert_eq!(plan.steps[0].tool, ToolKind::FormatTranslator);
        assert_eq!(
            plan.steps[0].command.arg_strings(),
            vec![input.display().to_string(), copy.display().to_string()]
        );

        assert_eq!(plan.steps[1].tool, ToolKind::OverviewBuilder);
        assert_eq!(
            plan.steps[1].command.arg_strings(),
            vec![
                "-r".to_string(),
                "nearest".to_string(),
                copy.display().to_string(),
                "2".to_string(),
                "4".to_string(),
                "8".to_string(),
            ]
        );
    }

    #[test]
    fn test_srtm_plan() {
        let (dir, input) = fixture("N31E034.tif");
        let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");
        let request = JobRequest::new(Operation::Srtm, &input, dir.path()).with_levels("ignored");

        let plan = JobPlan::build(&request, &tools).unwrap();
        assert_eq!(plan.result_path, dir.path().join("N31E034.hgt"));
        assert_eq!(plan.steps[0].command.arg_strings()[..2], ["-of", "SRTMHGT"]);
    }

    #[test]
    fn test_every_step_carries_gdal_data() {
        let (dir, input) = fixture("map.tif");
        let tools = ToolLocator::from_bin_dir("/opt/gdal/bin");
        let request = JobRequest::new(Operation::Overview, &input, dir.path());

        let plan = JobPlan::build(&request, &tools).unwrap();
        for step in &plan.steps {
            let (key, value) = &step.command.envs()[0];
            assert_eq!(key, "GDAL_DATA");
            assert_eq!(Path::new(value), Path::new("/opt/gdal/bin/gdal-data"));
        }
    }

    #[test]
    fn test_require_tools_reports_first_missing() {
        let (dir, input) = fixture("map.tif");
        let tools = ToolLocator::from_bin_dir(dir.path().join("bin"));
        let request = JobRequest::new(Operation::Overview, &input, dir.path());

        let plan = JobPlan::build(&request, &tools).unwrap();
        match plan.require_tools(&tools) {
            Err(Error::ToolNotFound { tool, .. }) => assert_eq!(tool, "gdal_translate"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
