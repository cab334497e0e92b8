//! Builder for external tool invocations with a combined output stream.

use std::ffi::OsString;
use std::fmt;
use std::io::PipeReader;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

/// A single external tool invocation: program, arguments and environment
/// overrides.
///
/// # Example
///
/// ```
/// use mapforge_gdal::ToolCommand;
/// use std::path::PathBuf;
///
/// let mut cmd = ToolCommand::new(PathBuf::from("gdal_translate"));
/// cmd.arg("-of").arg("SRTMHGT").arg("in.tif").arg("out.hgt");
/// assert_eq!(cmd.to_string(), "gdal_translate -of SRTMHGT in.tif out.hgt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(String, OsString)>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<OsString>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<OsString>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable on top of the inherited environment.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<OsString>) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, lossily converted for inspection.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    /// Environment overrides.
    pub fn envs(&self) -> &[(String, OsString)] {
        &self.envs
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        cmd
    }

    /// Run to completion and capture stdout and stderr separately.
    pub fn output(&self) -> std::io::Result<Output> {
        self.command().output()
    }

    /// Spawn the process with stdout and stderr writing into one pipe.
    ///
    /// Returns the child and the read end of the shared pipe. The write ends
    /// are released before returning, so the reader sees end-of-file once the
    /// child (and anything it spawned that inherited the pipe) exits.
    ///
    /// On unix the child leads a new process group, so [`kill_tree`] reaches
    /// the processes it starts as well.
    pub fn spawn_combined(&self) -> std::io::Result<(Child, PipeReader)> {
        let (reader, writer) = std::io::pipe()?;
        let writer_err = writer.try_clone()?;

        let mut cmd = self.command();
        cmd.stdout(writer).stderr(writer_err);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        // The Command still owns both write ends.
        drop(cmd);

        Ok((child, reader))
    }
}

/// Kill a child started by [`ToolCommand::spawn_combined`] together with the
/// processes it started. The child still has to be reaped.
#[cfg(unix)]
pub fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        // Group already gone; the leader may still be an unreaped zombie.
        Err(Errno::ESRCH) => child.kill(),
        Err(e) => Err(e.into()),
    }
}

/// Kill a child started by [`ToolCommand::spawn_combined`] together with the
/// processes it started. The child still has to be reaped.
#[cfg(windows)]
pub fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID"])
        .arg(child.id().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => Ok(()),
        _ => child.kill(),
    }
}

#[cfg(not(any(unix, windows)))]
pub fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
