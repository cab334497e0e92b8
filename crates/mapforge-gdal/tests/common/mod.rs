//! Shared fixtures for runner integration tests.
//!
//! Provides [`FakeToolchain`], a temp directory laid out like a GDAL `bin`
//! folder whose tools are small `/bin/sh` scripts.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use mapforge_gdal::{JobEvent, JobResult, ProgressLine, ToolKind, ToolLocator};
use tempfile::TempDir;

pub struct FakeToolchain {
    pub root: TempDir,
    pub bin: PathBuf,
    pub out: PathBuf,
}

impl FakeToolchain {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("bin");
        let out = root.path().join("out");
        fs::create_dir_all(bin.join("gdal-data")).unwrap();
        fs::create_dir_all(&out).unwrap();
        Self { root, bin, out }
    }

    pub fn locator(&self) -> ToolLocator {
        ToolLocator::from_bin_dir(&self.bin)
    }

    /// Create an input file with the given name.
    pub fn input(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, b"raster").unwrap();
        path
    }

    /// Install a tool whose body is `script`. Every invocation first appends
    /// its arguments, one per line, to [`FakeToolchain::args_log`].
    pub fn install(&self, kind: ToolKind, script: &str) {
        let path = self.bin.join(kind.file_name());
        let log = self.args_log(kind);
        let body = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" >> '{}'\n{}\n",
            log.display(),
            script
        );
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn args_log(&self, kind: ToolKind) -> PathBuf {
        self.root.path().join(format!("{}.args", kind.program_name()))
    }

    /// Every recorded argument, in invocation order, if the tool ever ran.
    pub fn recorded_args(&self, kind: ToolKind) -> Option<Vec<String>> {
        fs::read_to_string(self.args_log(kind))
            .ok()
            .map(|s| s.lines().map(str::to_string).collect())
    }

    pub fn ran(&self, kind: ToolKind) -> bool {
        self.args_log(kind).exists()
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }
}

/// Split a finished event list into output lines, started steps and the result.
pub fn split_events(events: Vec<JobEvent>) -> (Vec<ProgressLine>, Vec<String>, JobResult) {
    let mut lines = Vec::new();
    let mut steps = Vec::new();
    let mut result = None;
    for event in events {
        assert!(result.is_none(), "event after Finished");
        match event {
            JobEvent::Output(line) => lines.push(line),
            JobEvent::StepStarted { command_line, .. } => steps.push(command_line),
            JobEvent::Finished(r) => result = Some(r),
        }
    }
    (lines, steps, result.expect("stream ended without Finished"))
}
