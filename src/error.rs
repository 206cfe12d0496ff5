//! Error types for the build command.
//!
//! Defines [`BuildError`], the unified error type for fatal build
//! failures. Each variant carries a clear description of what went wrong
//! and actionable guidance on how to fix it. Per-file map reconciliation
//! failures are not fatal and live in the merge module instead.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::engine::EngineReport;

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// Fatal failure of a build invocation.
///
/// Any of these terminates the command with a non-zero outcome. There
/// are no retries.
#[derive(Debug)]
pub enum BuildError {
    /// The build properties file could not be loaded or parsed.
    Config {
        /// Path to the properties file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// No engine command is configured; nothing can be built.
    EngineNotConfigured,

    /// The SQL output directory could not be removed or recreated.
    DirectoryPreparation {
        /// The directory that failed to prepare.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The external build engine reported failure (or never ran).
    Engine {
        /// The captured engine outcome.
        report: EngineReport,
    },

    /// An I/O error during orchestration (e.g. enumerating artifacts).
    Io(io::Error),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {detail}\n  To fix: edit the file and correct the issue.",
                    path.display()
                )
            }
            Self::EngineNotConfigured => {
                write!(
                    f,
                    "no build engine configured.\n  To fix: set the engine command in sqlforge.toml:\n    [engine]\n    command = \"./tools/build-sql.sh\""
                )
            }
            Self::DirectoryPreparation { path, source } => {
                write!(
                    f,
                    "could not prepare SQL output directory '{}': {source}\n  To fix: check file permissions and that the path is not a regular file.",
                    path.display()
                )
            }
            Self::Engine { report } => {
                match report.exit_code {
                    Some(code) => write!(f, "SQL build task failed (exit code {code}).")?,
                    None => write!(f, "SQL build task failed (no exit code).")?,
                }
                write!(f, "\n  To get more details, re-run with the --verbose option.")
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryPreparation { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<io::Error> for BuildError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
