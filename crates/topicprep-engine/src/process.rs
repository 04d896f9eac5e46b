//! Out-of-process engine calls with a deadline, a stderr tail and cleanup of
//! partially written outputs on every failure path.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use topicprep_core::{EngineFailure, Error, Result};

const MAX_TAIL_LINES: usize = 20;
const KILL_GRACE_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub program: PathBuf,
    /// Label used in logs and errors, e.g. `import-file`.
    pub stage: String,
    pub args: Vec<OsString>,
    /// Files the command is expected to create; removed if it fails.
    pub outputs: Vec<PathBuf>,
    pub timeout: Option<Duration>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>, stage: impl Into<String>) -> Self {
        Self { program: program.into(), stage: stage.into(), args: Vec::new(), outputs: Vec::new(), timeout: None }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_name(&self) -> String { self.program.display().to_string() }

    fn failure(&self, failure: EngineFailure) -> Error {
        self.remove_outputs();
        Error::Engine(failure)
    }

    fn remove_outputs(&self) {
        for path in &self.outputs {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed partial engine output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove engine output"),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub stderr_tail: Vec<String>,
}

pub async fn run_command(cmd: &EngineCommand) -> Result<CommandReport> {
    let started = Instant::now();
    info!(program = %cmd.program.display(), stage = %cmd.stage, args = ?cmd.args, "engine_command_start");

    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            cmd.failure(EngineFailure::Spawn { program: cmd.program_name(), stage: cmd.stage.clone(), reason: e.to_string() })
        })?;

    let stdout_task = child.stdout.take().map(|out| tokio::spawn(read_tail(out)));
    let stderr_task = child.stderr.take().map(|err| tokio::spawn(read_tail(err)));

    let waited = match cmd.timeout {
        None => child.wait().await,
        Some(deadline) => match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::time::timeout(Duration::from_secs(KILL_GRACE_SECS), child.wait()).await;
                warn!(stage = %cmd.stage, seconds = deadline.as_secs(), "engine command timed out");
                return Err(cmd.failure(EngineFailure::Timeout {
                    program: cmd.program_name(),
                    stage: cmd.stage.clone(),
                    seconds: deadline.as_secs(),
                }));
            }
        },
    };
    let status = waited.map_err(|e| {
        cmd.failure(EngineFailure::Spawn { program: cmd.program_name(), stage: cmd.stage.clone(), reason: e.to_string() })
    })?;

    if let Some(task) = stdout_task {
        if let Ok(lines) = task.await {
            for line in lines {
                debug!(stage = %cmd.stage, "{line}");
            }
        }
    }
    let stderr_tail: Vec<String> = match stderr_task {
        Some(task) => task.await.map(Vec::from).unwrap_or_default(),
        None => Vec::new(),
    };

    let report = CommandReport {
        exit_code: status.code(),
        duration_ms: started.elapsed().as_millis() as u64,
        stderr_tail,
    };
    info!(
        program = %cmd.program.display(),
        stage = %cmd.stage,
        exit_code = ?report.exit_code,
        duration_ms = report.duration_ms,
        "engine_command_finished"
    );

    if !status.success() {
        return Err(cmd.failure(EngineFailure::NonZeroExit {
            program: cmd.program_name(),
            stage: cmd.stage.clone(),
            status: status.to_string(),
            stderr_tail: report.stderr_tail.join("\n"),
        }));
    }
    if let Some(missing) = cmd.outputs.iter().find(|p| !p.exists()) {
        let missing = missing.clone();
        return Err(cmd.failure(EngineFailure::MissingOutput { stage: cmd.stage.clone(), path: missing }));
    }
    Ok(report)
}

/// Blocking wrapper for synchronous callers; must not be called from inside
/// a tokio runtime.
pub fn run_command_blocking(cmd: &EngineCommand) -> Result<CommandReport> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|e| {
        Error::Engine(EngineFailure::Spawn {
            program: cmd.program_name(),
            stage: cmd.stage.clone(),
            reason: format!("could not start runtime: {e}"),
        })
    })?;
    runtime.block_on(run_command(cmd))
}

async fn read_tail<R>(stream: R) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        push_tail(&mut tail, line, MAX_TAIL_LINES);
    }
    tail
}

fn push_tail(buf: &mut VecDeque<String>, line: String, limit: usize) {
    buf.push_back(line);
    if buf.len() > limit {
        buf.pop_front();
    }
}
