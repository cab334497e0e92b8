//! Supervised execution of conversion jobs.
//!
//! A job is submitted to a [`ConversionJobRunner`] and observed through a
//! [`JobStream`], an iterator of [`JobEvent`]s that always ends with exactly
//! one [`JobEvent::Finished`]. The external tools run on a dedicated worker
//! thread; the caller's thread only iterates.

use crate::command::kill_tree;
use crate::{Error, JobPlan, JobRequest, Operation, PlannedStep, Result, ToolKind, ToolLocator};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Number of trailing output lines kept as failure diagnostic.
pub const DEFAULT_TAIL_LINES: usize = 20;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One line of combined stdout/stderr from a running tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressLine {
    /// Index of the step within the job's plan.
    pub step: usize,
    pub tool: ToolKind,
    /// Line text with the trailing line terminator removed.
    pub text: String,
}

/// Terminal outcome of a job.
#[derive(Debug)]
pub struct JobResult {
    pub operation: Operation,
    /// Result path on success.
    pub outcome: Result<PathBuf>,
}

impl JobResult {
    fn failure(operation: Operation, error: Error) -> Self {
        Self {
            operation,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Path produced by the job, if it succeeded.
    pub fn result_path(&self) -> Option<&Path> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// `0` on success, the tool's exit code when it exited non-zero, `None`
    /// when no exit code applies (validation, missing tool, cancellation,
    /// signal).
    pub fn exit_code(&self) -> Option<i32> {
        match &self.outcome {
            Ok(_) => Some(0),
            Err(Error::ToolFailed { exit_code, .. }) => *exit_code,
            Err(_) => None,
        }
    }

    /// Human-readable failure description.
    pub fn diagnostic(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Err(Error::Cancelled))
    }
}

/// Events produced by a [`JobStream`].
#[derive(Debug)]
pub enum JobEvent {
    /// A tool is about to be launched.
    StepStarted {
        step: usize,
        tool: ToolKind,
        command_line: String,
    },
    /// A line of tool output.
    Output(ProgressLine),
    /// The job is over. Always the last event.
    Finished(JobResult),
}

/// Shared state between a job's worker, its stream and cancel handles.
#[derive(Debug, Default)]
struct JobControl {
    cancelled: AtomicBool,
    finished: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl JobControl {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) -> bool {
        let mut slot = self.child.lock();
        if self.finished.load(Ordering::SeqCst) {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = &mut *slot {
            // Already exited is fine.
            let _ = kill_tree(child);
        }
        true
    }

    /// Mark the job finished and settle its outcome. A cancel that got in
    /// first turns the outcome into [`Error::Cancelled`].
    fn complete(&self, outcome: Result<PathBuf>) -> Result<PathBuf> {
        let _slot = self.child.lock();
        self.finished.store(true, Ordering::SeqCst);
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            outcome
        }
    }

    /// Hand the running child to the control so it can be killed. A cancel
    /// that raced the spawn is honoured here.
    fn attach(&self, mut child: Child) {
        let mut slot = self.child.lock();
        if self.is_cancelled() {
            let _ = kill_tree(&mut child);
        }
        *slot = Some(child);
    }

    /// Wait for the attached child without holding the lock across the wait,
    /// so `cancel` can still reach it.
    fn wait(&self) -> std::io::Result<ExitStatus> {
        loop {
            {
                let mut slot = self.child.lock();
                match &mut *slot {
                    Some(child) => {
                        if let Some(status) = child.try_wait()? {
                            slot.take();
                            return Ok(status);
                        }
                    }
                    None => {
                        return Err(std::io::Error::other("no child process attached"));
                    }
                }
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Kill and reap the attached child, if any.
    fn abort(&self) {
        if let Some(mut child) = self.child.lock().take() {
            let _ = kill_tree(&mut child);
            let _ = child.wait();
        }
    }
}

/// Cancels the job it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    control: Arc<JobControl>,
}

impl CancelHandle {
    /// Terminate the running tool. The job finishes with [`Error::Cancelled`].
    ///
    /// Returns `false` if the job had already finished.
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }
}

/// Runs conversion jobs against a fixed set of tools.
///
/// # Example
///
/// ```no_run
/// use mapforge_gdal::{ConversionJobRunner, JobEvent, JobRequest, Operation, ToolLocator};
///
/// let runner = ConversionJobRunner::new(ToolLocator::from_bin_dir("/opt/gdal/bin"));
/// let request = JobRequest::new(Operation::Tile, "/maps/israel.tif", "/maps").with_levels("0-12");
///
/// for event in runner.submit(request) {
///     match event {
///         JobEvent::Output(line) => println!("{}", line.text),
///         JobEvent::Finished(result) => println!("{:?}", result.outcome),
///         JobEvent::StepStarted { .. } => {}
///     }
/// }
/// ```
#[derive(Debug)]
pub struct ConversionJobRunner {
    tools: Arc<ToolLocator>,
    tail_lines: usize,
    current: Mutex<Option<Arc<JobControl>>>,
}

impl ConversionJobRunner {
    /// Create a runner for the given tool layout.
    pub fn new(tools: ToolLocator) -> Self {
        Self {
            tools: Arc::new(tools),
            tail_lines: DEFAULT_TAIL_LINES,
            current: Mutex::new(None),
        }
    }

    /// Number of trailing output lines kept for failure diagnostics.
    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines.max(1);
        self
    }

    pub fn tools(&self) -> &ToolLocator {
        &self.tools
    }

    /// Validate a request and build its invocations without launching
    /// anything.
    pub fn plan(&self, request: &JobRequest) -> Result<JobPlan> {
        JobPlan::build(request, &self.tools)
    }

    /// Submit a job. Nothing runs until the returned stream is first polled.
    pub fn submit(&self, request: JobRequest) -> JobStream {
        let control = Arc::new(JobControl::default());
        *self.current.lock() = Some(Arc::clone(&control));

        let plan = self.plan(&request);
        JobStream {
            operation: request.operation,
            state: StreamState::Pending {
                plan,
                tools: Arc::clone(&self.tools),
                tail_lines: self.tail_lines,
            },
            control,
        }
    }

    /// Cancel the most recently submitted job.
    ///
    /// Returns `false` if there is no job or it already finished.
    pub fn cancel(&self) -> bool {
        match &*self.current.lock() {
            Some(control) => control.cancel(),
            None => false,
        }
    }
}

enum StreamState {
    Pending {
        plan: Result<JobPlan>,
        tools: Arc<ToolLocator>,
        tail_lines: usize,
    },
    Running {
        events: Receiver<JobEvent>,
    },
    Done,
}

/// Lazy sequence of [`JobEvent`]s for one submitted job.
///
/// Dropping the stream before it finishes cancels the job.
pub struct JobStream {
    operation: Operation,
    state: StreamState,
    control: Arc<JobControl>,
}

impl JobStream {
    /// A handle that can cancel this job from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Drive the job to completion, passing every event to `sink`, and
    /// return the result.
    pub fn run(mut self, mut sink: impl FnMut(&JobEvent)) -> JobResult {
        while let Some(event) = self.next() {
            sink(&event);
            if let JobEvent::Finished(result) = event {
                return result;
            }
        }
        // Only reachable when the caller already iterated the stream to its end.
        JobResult::failure(
            self.operation,
            Error::Unexpected("job stream already consumed".into()),
        )
    }

    fn start(&mut self) -> JobEvent {
        let operation = self.operation;
        let StreamState::Pending {
            plan,
            tools,
            tail_lines,
        } = std::mem::replace(&mut self.state, StreamState::Done)
        else {
            unreachable!("start called on a running stream");
        };

        let plan = match plan.and_then(|plan| plan.require_tools(&tools).map(|_| plan)) {
            Ok(plan) => plan,
            Err(e) => return self.finish(JobResult::failure(operation, e)),
        };
        if self.control.is_cancelled() {
            return self.finish(JobResult::failure(operation, Error::Cancelled));
        }

        let (tx, rx) = mpsc::channel();
        let control = Arc::clone(&self.control);
        let spawned = thread::Builder::new()
            .name("mapforge-job".to_string())
            .spawn(move || {
                let outcome = control.complete(run_plan(&plan, &control, tail_lines, &tx));
                let _ = tx.send(JobEvent::Finished(JobResult {
                    operation: plan.operation,
                    outcome,
                }));
            });

        if let Err(e) = spawned {
            return self.finish(JobResult::failure(operation, e.into()));
        }

        self.state = StreamState::Running { events: rx };
        self.receive()
    }

    fn receive(&mut self) -> JobEvent {
        let StreamState::Running { events } = &self.state else {
            unreachable!("receive called on a stream that is not running");
        };

        match events.recv() {
            Ok(JobEvent::Finished(result)) => self.finish(result),
            Ok(event) => event,
            Err(_) => self.finish(JobResult::failure(
                self.operation,
                Error::Unexpected("job worker exited without a result".into()),
            )),
        }
    }

    fn finish(&mut self, result: JobResult) -> JobEvent {
        self.control.finished.store(true, Ordering::SeqCst);
        self.state = StreamState::Done;
        JobEvent::Finished(result)
    }
}

impl Iterator for JobStream {
    type Item = JobEvent;

    fn next(&mut self) -> Option<JobEvent> {
        match self.state {
            StreamState::Pending { .. } => Some(self.start()),
            StreamState::Running { .. } => Some(self.receive()),
            StreamState::Done => None,
        }
    }
}

impl Drop for JobStream {
    fn drop(&mut self) {
        if matches!(self.state, StreamState::Running { .. }) {
            self.control.cancel();
        }
    }
}

fn run_plan(
    plan: &JobPlan,
    control: &JobControl,
    tail_lines: usize,
    tx: &Sender<JobEvent>,
) -> Result<PathBuf> {
    for (index, step) in plan.steps.iter().enumerate() {
        if control.is_cancelled() {
            return Err(Error::Cancelled);
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Running {}: {}", step.tool, step.command);

        let _ = tx.send(JobEvent::StepStarted {
            step: index,
            tool: step.tool,
            command_line: step.command.to_string(),
        });

        if let Err(e) = run_step(index, step, control, tail_lines, tx) {
            #[cfg(feature = "tracing")]
            tracing::warn!("{} step {} failed: {}", plan.operation, index + 1, e);
            return Err(e);
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("{} finished: {}", plan.operation, plan.result_path.display());

    Ok(plan.result_path.clone())
}

fn run_step(
    index: usize,
    step: &PlannedStep,
    control: &JobControl,
    tail_lines: usize,
    tx: &Sender<JobEvent>,
) -> Result<()> {
    let (child, reader) = step.command.spawn_combined().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(step.tool.program_name(), step.command.program())
        } else {
            Error::Unexpected(format!("failed to launch {}: {}", step.tool, e))
        }
    })?;
    control.attach(child);

    let mut tail = VecDeque::with_capacity(tail_lines);
    if let Err(e) = forward_lines(reader, |text| {
        if tail.len() == tail_lines {
            tail.pop_front();
        }
        tail.push_back(text.clone());
        let _ = tx.send(JobEvent::Output(ProgressLine {
            step: index,
            tool: step.tool,
            text,
        }));
    }) {
        control.abort();
        return Err(Error::Unexpected(format!(
            "failed to read {} output: {}",
            step.tool, e
        )));
    }

    let status = control.wait()?;

    #[cfg(feature = "tracing")]
    tracing::debug!("{} exited with {}", step.tool, status);

    if control.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if !status.success() {
        let output = Vec::from(tail).join("\n");
        return Err(Error::tool_failed(step.tool.program_name(), status.code(), output));
    }

    Ok(())
}

/// Split a byte stream on `\n`, strip a trailing `\r`, and hand each line to
/// `emit` as lossy UTF-8.
fn forward_lines(reader: impl Read, mut emit: impl FnMut(String)) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        emit(String::from_utf8_lossy(&buf).into_owned());
    }
}
