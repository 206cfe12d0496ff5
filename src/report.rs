//! Console reporting for build results.

use std::fmt;
use std::io::IsTerminal as _;
use std::path::Path;
use std::str::FromStr;

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_WHITE_ON_RED: &str = "\x1b[37;41m";
const ANSI_RESET: &str = "\x1b[0m";

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Output format for the build summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable console output.
    #[default]
    Text,
    /// Machine-parseable JSON envelope.
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format '{}'. Use: text or json", s),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Sink for user-visible build progress and results.
pub trait Reporter {
    /// A file was produced by the build.
    fn generated_file(&mut self, path: &Path);

    /// The build finished; `sql_count` SQL artifacts were produced.
    fn summary(&mut self, sql_count: usize);

    /// The command failed; render a structured error block.
    fn error(&mut self, title: &str, detail: &[String]);
}

/// The count line, pluralized the same way regardless of sink.
#[must_use]
pub fn summary_line(sql_count: usize) -> String {
    let (s, have) = if sql_count > 1 { ("s", "have") } else { ("", "has") };
    format!("{sql_count} SQL file{s} {have} been generated.")
}

/// Render an error block as uniformly padded lines: title, blank, detail.
fn error_block_lines(title: &str, detail: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(detail.len() + 2);
    lines.push(title.to_owned());
    lines.push(String::new());
    lines.extend(detail.iter().cloned());

    let width = lines.iter().map(String::len).max().unwrap_or(0);
    lines
        .into_iter()
        .map(|line| format!(" {line:<width$} "))
        .collect()
}

// ---------------------------------------------------------------------------
// ConsoleReporter
// ---------------------------------------------------------------------------

/// Reporter writing to stdout/stderr with ANSI color on TTYs.
pub struct ConsoleReporter {
    color: bool,
}

impl ConsoleReporter {
    /// Color only when stdout is a terminal.
    #[must_use]
    pub fn auto() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    /// No color, ever.
    #[must_use]
    pub const fn plain() -> Self {
        Self { color: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{ANSI_RESET}")
        } else {
            text.to_owned()
        }
    }
}

impl Reporter for ConsoleReporter {
    fn generated_file(&mut self, path: &Path) {
        println!(
            "  {} {}",
            self.paint(ANSI_GREEN, ">>"),
            path.display()
        );
    }

    fn summary(&mut self, sql_count: usize) {
        println!(
            "{}",
            self.paint(ANSI_YELLOW, &summary_line(sql_count))
        );
    }

    fn error(&mut self, title: &str, detail: &[String]) {
        for line in error_block_lines(title, detail) {
            eprintln!("{}", self.paint(ANSI_WHITE_ON_RED, &line));
        }
    }
}

// ---------------------------------------------------------------------------
// SilentReporter
// ---------------------------------------------------------------------------

/// Reporter for machine-readable modes: progress is discarded so stdout
/// stays clean, but error blocks still land on stderr.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn generated_file(&mut self, _path: &Path) {}

    fn summary(&mut self, _sql_count: usize) {}

    fn error(&mut self, title: &str, detail: &[String]) {
        for line in error_block_lines(title, detail) {
            eprintln!("{line}");
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter (test support)
// ---------------------------------------------------------------------------

/// Reporter that records calls instead of printing.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub files: Vec<std::path::PathBuf>,
    pub summaries: Vec<usize>,
    pub errors: Vec<String>,
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn generated_file(&mut self, path: &Path) {
        self.files.push(path.to_path_buf());
    }

    fn summary(&mut self, sql_count: usize) {
        self.summaries.push(sql_count);
    }

    fn error(&mut self, title: &str, detail: &[String]) {
        self.errors.push(format!("{title}: {}", detail.join(" ")));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_pluralizes_above_one() {
        assert_eq!(summary_line(0), "0 SQL file has been generated.");
        assert_eq!(summary_line(1), "1 SQL file has been generated.");
        assert_eq!(summary_line(2), "2 SQL files have been generated.");
        assert_eq!(summary_line(7), "7 SQL files have been generated.");
    }

    #[test]
    fn error_block_pads_lines_to_uniform_width() {
        let lines = error_block_lines(
            "[sqlforge] Error",
            &["something went wrong".to_owned()],
        );
        assert_eq!(lines.len(), 3);
        let width = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == width));
        assert!(lines[0].contains("[sqlforge] Error"));
        assert_eq!(lines[1].trim(), "");
        assert!(lines[2].contains("something went wrong"));
    }

    #[test]
    fn plain_reporter_paints_nothing() {
        let reporter = ConsoleReporter::plain();
        assert_eq!(reporter.paint(ANSI_GREEN, "text"), "text");
    }

    #[test]
    fn output_format_parses() {
        assert_eq!("text".parse::<OutputFormat>().expect("parse"), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().expect("parse"), OutputFormat::Json);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(format!("{}", OutputFormat::Text), "text");
        assert_eq!(format!("{}", OutputFormat::Json), "json");
    }
}
