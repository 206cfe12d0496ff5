//! Build properties (`sqlforge.toml`).
//!
//! Defines the typed configuration for the project-root `sqlforge.toml`,
//! covering the SQL output directory and the external build engine.
//! Missing file means all defaults (no error).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// File name of the build properties, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "sqlforge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level build properties.
///
/// Parsed from `sqlforge.toml`. Missing fields use defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Output settings.
    #[serde(default)]
    pub build: BuildSection,

    /// External build engine settings.
    #[serde(default)]
    pub engine: EngineSection,
}

// ---------------------------------------------------------------------------
// BuildSection
// ---------------------------------------------------------------------------

/// Output settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Where generated SQL lands. Relative paths resolve against the
    /// project root. Unset means `.sqlforge/cache/sql`.
    #[serde(default)]
    pub sql_output_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// External build engine settings.
///
/// The engine is an opaque command run via `sh -c` in the project root.
/// It receives its parameters through `SQLFORGE_*` environment
/// variables; see the engine module.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Shell command that performs the SQL build task.
    /// `None` means the build command refuses to run.
    #[serde(default)]
    pub command: Option<String>,

    /// Seconds to wait for the engine before killing it.
    #[serde(default = "default_engine_timeout")]
    pub timeout_seconds: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            command: None,
            timeout_seconds: default_engine_timeout(),
        }
    }
}

const fn default_engine_timeout() -> u32 {
    600
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl BuildConfig {
    /// Resolve the SQL output directory against the project root.
    ///
    /// An absolute configured path is used as-is; a relative one is
    /// joined to `root`. Unset falls back to `.sqlforge/cache/sql`
    /// under `root`.
    #[must_use]
    pub fn sql_dir(&self, root: &Path) -> PathBuf {
        match &self.build.sql_output_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join(".sqlforge").join("cache").join("sql"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading the build properties file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl BuildConfig {
    /// Load build properties from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or
    /// parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse build properties from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
