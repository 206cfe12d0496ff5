//! External build engine invocation.
//!
//! The SQL build itself is performed by an external engine configured as
//! a shell command. The [`BuildEngine`] trait is the seam: production
//! code uses [`ProcessEngine`], tests substitute an in-process fake.
//!
//! The engine receives its parameters through environment variables:
//! `SQLFORGE_TASK` (always `build-sql`), `SQLFORGE_SQL_DIR` (the resolved
//! output directory), and `SQLFORGE_CONNECTION` (only when a connection
//! was selected).

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Task name exported to the engine process.
pub const BUILD_SQL_TASK: &str = "build-sql";

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

/// Parameters for one SQL build run.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    /// Directory the engine must write its artifacts into.
    pub sql_dir: PathBuf,
    /// Named database connection to build for, if any.
    pub connection: Option<String>,
}

/// Captured outcome of an engine run.
///
/// The engine only signals overall success or failure; there is no
/// partial-success state.
#[derive(Clone, Debug)]
pub struct EngineReport {
    /// Whether the engine exited successfully.
    pub passed: bool,
    /// Process exit code, `None` when killed (timeout or signal).
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl EngineReport {
    /// A failed report for an engine that never ran (e.g. spawn failure).
    #[must_use]
    pub fn not_run(detail: String) -> Self {
        Self {
            passed: false,
            exit_code: None,
            stdout: String::new(),
            stderr: detail,
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Failure to run the engine process at all.
#[derive(Debug)]
pub enum EngineError {
    /// The engine process could not be spawned.
    Spawn {
        /// The configured command string.
        command: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// Waiting on the engine process failed.
    Wait {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, source } => {
                write!(f, "could not spawn build engine '{command}': {source}")
            }
            Self::Wait { source } => {
                write!(f, "could not wait on build engine: {source}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Wait { source } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildEngine
// ---------------------------------------------------------------------------

/// The external SQL build collaborator.
pub trait BuildEngine {
    /// Run the `build-sql` task.
    ///
    /// # Errors
    /// Returns [`EngineError`] when the engine could not be run at all.
    /// An engine that ran and failed is a successful `Ok` with
    /// `passed == false`.
    fn build_sql(&self, request: &BuildRequest) -> Result<EngineReport, EngineError>;
}

// ---------------------------------------------------------------------------
// ProcessEngine
// ---------------------------------------------------------------------------

/// Runs the configured engine command via `sh -c` in the project root.
///
/// Stdout and stderr are captured; the child is killed once the
/// configured timeout elapses.
pub struct ProcessEngine {
    command: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessEngine {
    /// Create an engine for the given shell command and project root.
    #[must_use]
    pub fn new(command: String, working_dir: PathBuf, timeout_seconds: u32) -> Self {
        Self {
            command,
            working_dir,
            timeout: Duration::from_secs(u64::from(timeout_seconds)),
        }
    }
}

impl BuildEngine for ProcessEngine {
    fn build_sql(&self, request: &BuildRequest) -> Result<EngineReport, EngineError> {
        let start = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.args(["-c", self.command.as_str()])
            .current_dir(&self.working_dir)
            .env("SQLFORGE_TASK", BUILD_SQL_TASK)
            .env("SQLFORGE_SQL_DIR", &request.sql_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(connection) = &request.connection {
            cmd.env("SQLFORGE_CONNECTION", connection);
        }

        let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let stdout = drain(child.stdout.take());
                    let stderr = drain(child.stderr.take());
                    let exit_code = status.code();
                    return Ok(EngineReport {
                        passed: exit_code == Some(0),
                        exit_code,
                        stdout,
                        stderr,
                        duration_ms: elapsed_ms(start),
                    });
                }
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(EngineReport {
                            passed: false,
                            exit_code: None,
                            stdout: String::new(),
                            stderr: format!(
                                "killed by timeout after {}s",
                                self.timeout.as_secs()
                            ),
                            duration_ms: elapsed_ms(start),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Wait { source });
                }
            }
        }
    }
}

fn drain<R: std::io::Read>(stream: Option<R>) -> String {
    stream
        .map(|mut s| {
            let mut buf = String::new();
            let _ = s.read_to_string(&mut buf);
            buf
        })
        .unwrap_or_default()
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
