//! CLI end-to-end tests
//!
//! Tests for the mapforge command-line interface. Conversions run against fake
//! GDAL tools written as shell scripts.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the mapforge binary
#[allow(deprecated)]
fn mapforge_cmd() -> Command {
    Command::cargo_bin("mapforge").unwrap()
}

/// A scratch directory with a `bin` folder and a config file pointing at it.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(bin.join("gdal-data")).unwrap();
        fs::write(
            dir.path().join("mapforge.toml"),
            format!("[tools]\nbin_dir = {:?}\n", bin.display().to_string()),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PathBuf {
        self.path().join("mapforge.toml")
    }

    fn input(&self, name: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, b"raster").unwrap();
        path
    }

    #[cfg(unix)]
    fn install(&self, program: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path().join("bin").join(program);
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = mapforge_cmd();
        cmd.arg("--config").arg(self.config());
        cmd
    }
}

#[test]
#[serial]
fn test_cli_no_args_shows_help() {
    let mut cmd = mapforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
#[serial]
fn test_cli_help_flag() {
    let mut cmd = mapforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mapforge"))
        .stdout(predicate::str::contains("tiles"))
        .stdout(predicate::str::contains("overviews"))
        .stdout(predicate::str::contains("srtm"));
}

#[test]
#[serial]
fn test_cli_version_command() {
    let mut cmd = mapforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mapforge"));
}

#[test]
#[serial]
fn test_cli_tiles_nonexistent_file() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["tiles", "/nonexistent/path/map.tif"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
#[serial]
fn test_cli_rejects_unknown_resampling() {
    let ws = Workspace::new();
    let input = ws.input("map.tif");
    ws.cmd()
        .args(["tiles", "-r", "mode"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown resampling method"));
}

#[test]
#[serial]
fn test_cli_overviews_require_geotiff() {
    let ws = Workspace::new();
    let input = ws.input("map.png");
    ws.cmd()
        .arg("overviews")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GeoTIFF"));
}

#[test]
#[serial]
fn test_cli_overviews_reject_bad_levels() {
    let ws = Workspace::new();
    let input = ws.input("map.tif");
    ws.cmd()
        .args(["overviews", "--levels", "2 4 eight"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive integers"));
}

#[test]
#[serial]
fn test_cli_srtm_dry_run() {
    let ws = Workspace::new();
    let input = ws.input("N31E034.tif");
    ws.cmd()
        .args(["srtm", "--dry-run"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("-of SRTMHGT"))
        .stdout(predicate::str::contains("N31E034.hgt"))
        .stdout(predicate::str::contains("[DRY RUN]"));
}

#[test]
#[serial]
fn test_cli_missing_tool_names_path() {
    let ws = Workspace::new();
    let input = ws.input("map.tif");
    ws.cmd()
        .arg("tiles")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tool not found: gdal2tiles"))
        .stderr(predicate::str::contains(ws.path().join("bin").display().to_string()));
}

#[test]
#[serial]
fn test_cli_check_tools_reports_missing() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("gdal2tiles"))
        .stdout(predicate::str::contains("Some tools are missing"));
}

#[test]
#[serial]
fn test_cli_validate_rejects_bad_defaults() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[defaults]\ntile_levels = \"zero to ten\"\n").unwrap();

    let mut cmd = mapforge_cmd();
    cmd.arg("validate")
        .arg(&config_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tile_levels"));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_cli_tiles_streams_output_and_reports_result() {
    let ws = Workspace::new();
    ws.install(
        "gdal2tiles",
        "echo 'Generating Base Tiles:'\necho \"zoom $4\"\necho \"$5\"",
    );
    let input = ws.input("israel.tif");

    ws.cmd()
        .args(["tiles", "-z", "3-10", "-r", "cubic"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running command:"))
        .stdout(predicate::str::contains("Generating Base Tiles:"))
        .stdout(predicate::str::contains("zoom 3-10"))
        .stdout(predicate::str::contains("--resampling=cubic"))
        .stdout(predicate::str::contains(format!(
            "Tiles created in: {}",
            ws.path().join("israel_tiles").display()
        )));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_cli_tool_failure_exits_non_zero() {
    let ws = Workspace::new();
    ws.install("gdal_translate", "echo 'ERROR 1: unsupported format' 1>&2\nexit 3");
    let input = ws.input("map.tif");

    ws.cmd()
        .args(["srtm", "--json"])
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"exit_code\": 3"))
        .stdout(predicate::str::contains("\"error_kind\": \"tool_execution\""))
        .stderr(predicate::str::contains("exit code 3"));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_cli_stats_prints_min_max() {
    let ws = Workspace::new();
    ws.install(
        "gdalinfo",
        "echo 'Driver: SRTMHGT/SRTMHGT File Format'\n\
         echo '    STATISTICS_MINIMUM=-12'\n\
         echo '    STATISTICS_MAXIMUM=1024'",
    );
    let tiles = ws.path().join("srtm");
    fs::create_dir(&tiles).unwrap();
    fs::write(tiles.join("N31E034.hgt"), b"").unwrap();

    ws.cmd()
        .arg("stats")
        .arg(&tiles)
        .assert()
        .success()
        .stdout(predicate::str::contains("N31E034.hgt: min=-12, max=1024"));
}

#[test]
#[serial]
fn test_cli_stats_without_gdalinfo_reports_per_file_error() {
    let ws = Workspace::new();
    let tiles = ws.path().join("srtm");
    fs::create_dir(&tiles).unwrap();
    fs::write(tiles.join("N31E034.hgt"), b"").unwrap();

    ws.cmd()
        .arg("stats")
        .arg(&tiles)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[ERROR] Failed to process N31E034.hgt: tool not found: gdalinfo",
        ));
}
