//! Map-file reconciliation.
//!
//! Successive builds wipe the SQL output directory, but `.map` files carry
//! table-mapping state across runs. When a build regenerates a map file
//! whose previous version still matters, the two are reconciled: every
//! line of the freshly generated file is kept, in its original order, and
//! lines that only existed in the previous version are appended after it.
//!
//! Lines are compared by exact string equality, terminators included.
//! The subtraction is set-based, not multiset-based: a line that appears
//! anywhere in the generated file is dropped from the previous version's
//! remainder no matter how many times it occurred there.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Failure while reconciling a single map file.
///
/// These are local to one file. The caller reports them and keeps
/// processing the remaining build artifacts.
#[derive(Debug)]
pub enum MergeError {
    /// One of the two input files could not be read.
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The merged result could not be written back.
    Write {
        /// The path that failed to write.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "could not read map file '{}': {source}", path.display())
            }
            Self::Write { path, source } => {
                write!(
                    f,
                    "could not write merged map file '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge rule
// ---------------------------------------------------------------------------

/// Combine a freshly generated line sequence with a previous one.
///
/// The result is every line of `generated`, in order (duplicates
/// preserved), followed by the lines of `target` that do not appear
/// anywhere in `generated`, in their original relative order.
#[must_use]
pub fn merge_lines(generated: &[String], target: &[String]) -> Vec<String> {
    let seen: HashSet<&str> = generated.iter().map(String::as_str).collect();

    let mut merged = generated.to_vec();
    merged.extend(
        target
            .iter()
            .filter(|line| !seen.contains(line.as_str()))
            .cloned(),
    );
    merged
}

/// Reconcile the map file at `target` with the one at `generated`.
///
/// Reads both files, applies [`merge_lines`], and overwrites `target`
/// with the result. `generated` is never modified. Nothing is mutated
/// if either read fails.
///
/// # Errors
///
/// Returns [`MergeError::Read`] if either file cannot be read and
/// [`MergeError::Write`] if the result cannot be written back.
pub fn merge_map_files(target: &Path, generated: &Path) -> Result<(), MergeError> {
    let target_lines = read_lines(target)?;
    let generated_lines = read_lines(generated)?;

    let merged = merge_lines(&generated_lines, &target_lines);

    fs::write(target, merged.concat()).map_err(|source| MergeError::Write {
        path: target.to_path_buf(),
        source,
    })
}

/// Read a file as a sequence of lines, keeping each line's terminator.
///
/// A final line without a trailing newline is kept as-is, so it only
/// compares equal to another unterminated line.
fn read_lines(path: &Path) -> Result<Vec<String>, MergeError> {
    let contents = fs::read_to_string(path).map_err(|source| MergeError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(contents.split_inclusive('\n').map(str::to_owned).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
