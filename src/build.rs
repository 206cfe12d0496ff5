//! `sqlforge build` — run the external SQL build and reconcile map files.
//!
//! The run is a straight line: prepare the output directory, invoke the
//! engine, walk the artifacts. The one wrinkle is map reconciliation:
//! the output directory is wiped before every build, so `.map` files
//! from the previous run are parked in a temporary staging directory
//! first, then merged back into their regenerated counterparts.
//!
//! Fatal failures (directory preparation, engine failure) abort the
//! invocation. Per-file reconciliation failures are reported and
//! skipped; the remaining artifacts are still processed.

use std::ffi::{OsStr, OsString};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::config::{self, BuildConfig};
use crate::engine::{BuildEngine, BuildRequest, EngineReport, ProcessEngine};
use crate::error::BuildError;
use crate::merge::{self, MergeError};
use crate::report::{ConsoleReporter, OutputFormat, Reporter, SilentReporter};

const MAP_EXTENSION: &str = "map";
const SQL_EXTENSION: &str = "sql";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Build the SQL generation code for all schemas
///
/// Wipes the SQL output directory, runs the configured build engine,
/// merges regenerated .map files with their previous contents, and
/// reports the generated artifacts.
///
/// Examples:
///   sqlforge build
///   sqlforge build --connection analytics
///   sqlforge build --format json
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Named database connection to build SQL for
    #[arg(long)]
    pub connection: Option<String>,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

pub fn run(args: &BuildArgs, verbose: bool) -> Result<()> {
    let root = std::env::current_dir().context("Failed to resolve current directory")?;
    let config_path = root.join(config::CONFIG_FILE_NAME);
    let config = BuildConfig::load(&config_path).map_err(BuildError::from)?;

    let command = config
        .engine
        .command
        .clone()
        .ok_or(BuildError::EngineNotConfigured)?;
    let engine = ProcessEngine::new(command, root.clone(), config.engine.timeout_seconds);

    let format = args.format.unwrap_or_default();
    let mut reporter: Box<dyn Reporter> = match format {
        OutputFormat::Text => Box::new(ConsoleReporter::auto()),
        OutputFormat::Json => Box::new(SilentReporter),
    };

    let result = execute_build(
        &config,
        &root,
        args.connection.as_deref(),
        &engine,
        reporter.as_mut(),
    );

    match result {
        Ok(summary) => {
            if format == OutputFormat::Json {
                let envelope = BuildEnvelope::from(&summary);
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
            Ok(())
        }
        Err(BuildError::Engine { report }) => {
            if verbose {
                dump_engine_output(&report);
            }
            anyhow::bail!("SQL build failed")
        }
        Err(err) => Err(err.into()),
    }
}

/// Echo the captured engine output for --verbose failure diagnostics.
fn dump_engine_output(report: &EngineReport) {
    if !report.stdout.is_empty() {
        eprintln!("engine stdout:");
        for line in report.stdout.lines() {
            eprintln!("  {line}");
        }
    }
    if !report.stderr.is_empty() {
        eprintln!("engine stderr:");
        for line in report.stderr.lines() {
            eprintln!("  {line}");
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Result of a successful build invocation.
#[derive(Debug)]
pub struct BuildSummary {
    /// The resolved SQL output directory.
    pub sql_dir: PathBuf,
    /// Count of `.sql` artifacts produced.
    pub sql_files: usize,
    /// Every artifact produced, in processing order.
    pub generated: Vec<PathBuf>,
    /// Map files that were reconciled with a previous version.
    pub merged_maps: Vec<String>,
    /// Per-file reconciliation failures (non-fatal).
    pub merge_failures: Vec<MergeFailure>,
}

/// One map file that could not be reconciled.
#[derive(Debug, Serialize)]
pub struct MergeFailure {
    /// The artifact file name.
    pub file: String,
    /// What went wrong.
    pub detail: String,
}

/// JSON envelope for `--format json`.
#[derive(Debug, Serialize)]
pub struct BuildEnvelope {
    pub sql_files: usize,
    pub generated: Vec<String>,
    pub merged_maps: Vec<String>,
    pub merge_failures: Vec<MergeFailure>,
}

impl From<&BuildSummary> for BuildEnvelope {
    fn from(summary: &BuildSummary) -> Self {
        Self {
            sql_files: summary.sql_files,
            generated: summary
                .generated
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            merged_maps: summary.merged_maps.clone(),
            merge_failures: summary
                .merge_failures
                .iter()
                .map(|f| MergeFailure {
                    file: f.file.clone(),
                    detail: f.detail.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run one build: prepare the directory, invoke the engine, reconcile
/// and report the artifacts.
///
/// # Errors
///
/// Returns [`BuildError`] on fatal failures. The engine failure block
/// has already been rendered through `reporter` when
/// [`BuildError::Engine`] is returned.
pub fn execute_build(
    config: &BuildConfig,
    root: &Path,
    connection: Option<&str>,
    engine: &dyn BuildEngine,
    reporter: &mut dyn Reporter,
) -> Result<BuildSummary, BuildError> {
    let sql_dir = config.sql_dir(root);

    let prior_maps = stash_prior_maps(&sql_dir);
    prepare_output_dir(&sql_dir)?;

    let request = BuildRequest {
        sql_dir: sql_dir.clone(),
        connection: connection.map(str::to_owned),
    };
    let report = match engine.build_sql(&request) {
        Ok(report) => report,
        Err(err) => EngineReport::not_run(err.to_string()),
    };

    if !report.passed {
        reporter.error(
            "[sqlforge] Error",
            &[
                "An error occurred while running the \"sqlforge build\" command process."
                    .to_owned(),
                "To get more details, re-run the command with the \"--verbose\" option."
                    .to_owned(),
            ],
        );
        return Err(BuildError::Engine { report });
    }

    let mut summary = BuildSummary {
        sql_dir: sql_dir.clone(),
        sql_files: 0,
        generated: Vec::new(),
        merged_maps: Vec::new(),
        merge_failures: Vec::new(),
    };

    for name in list_output_files(&sql_dir)? {
        let final_path = sql_dir.join(&name);
        let extension = Path::new(&name).extension().and_then(OsStr::to_str);

        if extension == Some(MAP_EXTENSION)
            && let Some(prior) = prior_maps.path_for(&name)
        {
            let display_name = name.to_string_lossy().into_owned();
            match reconcile_map(prior, &final_path) {
                Ok(()) => summary.merged_maps.push(display_name),
                Err(err) => {
                    tracing::warn!("map reconciliation failed for {display_name}: {err}");
                    summary.merge_failures.push(MergeFailure {
                        file: display_name,
                        detail: err.to_string(),
                    });
                }
            }
        }

        reporter.generated_file(&final_path);

        if extension == Some(SQL_EXTENSION) {
            summary.sql_files += 1;
        }
        summary.generated.push(final_path);
    }

    reporter.summary(summary.sql_files);
    Ok(summary)
}

/// Wipe and recreate the output directory. Prior contents are lost;
/// map files have been parked by [`stash_prior_maps`] beforehand.
fn prepare_output_dir(sql_dir: &Path) -> Result<(), BuildError> {
    if sql_dir.exists() {
        fs::remove_dir_all(sql_dir).map_err(|source| BuildError::DirectoryPreparation {
            path: sql_dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(sql_dir).map_err(|source| BuildError::DirectoryPreparation {
        path: sql_dir.to_path_buf(),
        source,
    })
}

/// Merge the parked previous map file with the regenerated one, then
/// move the merged result into the final location.
fn reconcile_map(prior: &Path, generated: &Path) -> Result<(), MergeError> {
    merge::merge_map_files(prior, generated)?;
    fs::copy(prior, generated)
        .map(|_| ())
        .map_err(|source| MergeError::Write {
            path: generated.to_path_buf(),
            source,
        })
}

/// Enumerate files directly inside the output directory, sorted by name.
/// Subdirectories are ignored.
fn list_output_files(sql_dir: &Path) -> Result<Vec<OsString>, BuildError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(sql_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Prior-map staging
// ---------------------------------------------------------------------------

/// Map files parked before the output directory wipe.
///
/// Holds the staging `TempDir` alive for the duration of the build.
struct PriorMaps {
    _staging: Option<tempfile::TempDir>,
    files: BTreeMap<OsString, PathBuf>,
}

impl PriorMaps {
    const fn empty() -> Self {
        Self {
            _staging: None,
            files: BTreeMap::new(),
        }
    }

    fn path_for(&self, name: &OsStr) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }
}

/// Copy every `.map` file out of the output directory before it is
/// wiped. Staging failures degrade to "no prior version" for the
/// affected file; they never abort the build.
fn stash_prior_maps(sql_dir: &Path) -> PriorMaps {
    let entries = match fs::read_dir(sql_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return PriorMaps::empty(),
        Err(err) => {
            tracing::warn!("could not scan {} for map files: {err}", sql_dir.display());
            return PriorMaps::empty();
        }
    };

    let staging = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            tracing::warn!("could not create map staging directory: {err}");
            return PriorMaps::empty();
        }
    };

    let mut files = BTreeMap::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let is_map = Path::new(&name)
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext == MAP_EXTENSION);
        if !is_map || !entry.file_type().is_ok_and(|ft| ft.is_file()) {
            continue;
        }

        let parked = staging.path().join(&name);
        match fs::copy(entry.path(), &parked) {
            Ok(_) => {
                files.insert(name, parked);
            }
            Err(err) => {
                tracing::warn!(
                    "could not park prior map file {}: {err}",
                    entry.path().display()
                );
            }
        }
    }

    PriorMaps {
        _staging: Some(staging),
        files,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::engine::EngineError;
    use crate::report::RecordingReporter;

    /// Engine that writes a fixed set of files into the output directory.
    struct FakeEngine {
        files: Vec<(&'static str, &'static str)>,
        requests: RefCell<Vec<BuildRequest>>,
    }

    impl FakeEngine {
        fn writing(files: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                files,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl BuildEngine for FakeEngine {
        fn build_sql(&self, request: &BuildRequest) -> Result<EngineReport, EngineError> {
            self.requests.borrow_mut().push(request.clone());
            for (name, contents) in &self.files {
                fs::write(request.sql_dir.join(name), contents).expect("engine write");
            }
            Ok(EngineReport {
                passed: true,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 1,
            })
        }
    }

    /// Engine that always reports failure without writing anything.
    struct FailingEngine;

    impl BuildEngine for FailingEngine {
        fn build_sql(&self, _request: &BuildRequest) -> Result<EngineReport, EngineError> {
            Ok(EngineReport {
                passed: false,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "schema error".to_owned(),
                duration_ms: 1,
            })
        }
    }

    fn config_with_output(dir: &str) -> BuildConfig {
        BuildConfig::parse(&format!("[build]\nsql_output_dir = \"{dir}\"\n")).expect("config")
    }

    #[test]
    fn counts_sql_files_and_reports_each_artifact() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![
            ("books.sql", "CREATE TABLE book;\n"),
            ("authors.sql", "CREATE TABLE author;\n"),
            ("schema.map", "book\n"),
            ("notes.txt", "not counted\n"),
        ]);
        let mut reporter = RecordingReporter::default();

        let summary = execute_build(&config, root.path(), None, &engine, &mut reporter)
            .expect("build");

        assert_eq!(summary.sql_files, 2);
        assert_eq!(summary.generated.len(), 4);
        assert_eq!(reporter.files.len(), 4);
        assert_eq!(reporter.summaries, vec![2]);
        assert!(reporter.errors.is_empty());
    }

    #[test]
    fn artifacts_are_processed_in_sorted_order() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![
            ("zebra.sql", ""),
            ("alpha.sql", ""),
            ("middle.sql", ""),
        ]);
        let mut reporter = RecordingReporter::default();

        execute_build(&config, root.path(), None, &engine, &mut reporter).expect("build");

        let names: Vec<_> = reporter
            .files
            .iter()
            .map(|p| p.file_name().map(std::ffi::OsStr::to_os_string))
            .collect();
        assert_eq!(
            names,
            vec![
                Some(OsString::from("alpha.sql")),
                Some(OsString::from("middle.sql")),
                Some(OsString::from("zebra.sql")),
            ]
        );
    }

    #[test]
    fn colliding_map_file_is_reconciled() {
        let root = tempfile::tempdir().expect("tempdir");
        let out = root.path().join("out");
        fs::create_dir_all(&out).expect("mkdir");
        fs::write(out.join("schema.map"), "a\nb\nc\n").expect("write prior map");

        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![("schema.map", "b\nd\n")]);
        let mut reporter = RecordingReporter::default();

        let summary = execute_build(&config, root.path(), None, &engine, &mut reporter)
            .expect("build");

        assert_eq!(summary.merged_maps, vec!["schema.map".to_owned()]);
        assert!(summary.merge_failures.is_empty());
        assert_eq!(
            fs::read_to_string(out.join("schema.map")).expect("read"),
            "b\nd\na\nc\n"
        );
    }

    #[test]
    fn fresh_map_file_is_left_as_generated() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![("schema.map", "x\n")]);
        let mut reporter = RecordingReporter::default();

        let summary = execute_build(&config, root.path(), None, &engine, &mut reporter)
            .expect("build");

        assert!(summary.merged_maps.is_empty());
        assert_eq!(
            fs::read_to_string(root.path().join("out").join("schema.map")).expect("read"),
            "x\n"
        );
    }

    #[test]
    fn prior_non_map_files_are_wiped_not_merged() {
        let root = tempfile::tempdir().expect("tempdir");
        let out = root.path().join("out");
        fs::create_dir_all(&out).expect("mkdir");
        fs::write(out.join("stale.sql"), "DROP TABLE old;\n").expect("write stale");

        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![]);
        let mut reporter = RecordingReporter::default();

        let summary = execute_build(&config, root.path(), None, &engine, &mut reporter)
            .expect("build");

        assert_eq!(summary.sql_files, 0);
        assert!(!out.join("stale.sql").exists());
        assert_eq!(reporter.summaries, vec![0]);
    }

    #[test]
    fn engine_failure_renders_error_block_and_aborts() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_output("out");
        let mut reporter = RecordingReporter::default();

        let err = execute_build(&config, root.path(), None, &FailingEngine, &mut reporter)
            .expect_err("should fail");

        assert!(matches!(err, BuildError::Engine { .. }));
        assert_eq!(reporter.errors.len(), 1);
        assert!(reporter.errors[0].contains("sqlforge build"));
        assert!(reporter.errors[0].contains("--verbose"));
        assert!(reporter.files.is_empty());
        assert!(reporter.summaries.is_empty());
        // The directory was still prepared (wiped and recreated).
        assert!(root.path().join("out").exists());
    }

    #[test]
    fn unpreparable_output_dir_is_fatal() {
        let root = tempfile::tempdir().expect("tempdir");
        // A regular file where the output directory should go.
        fs::write(root.path().join("out"), "blocker").expect("write blocker");

        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![]);
        let mut reporter = RecordingReporter::default();

        let err = execute_build(&config, root.path(), None, &engine, &mut reporter)
            .expect_err("should fail");

        assert!(matches!(err, BuildError::DirectoryPreparation { .. }));
        assert!(engine.requests.borrow().is_empty());
    }

    #[test]
    fn connection_is_forwarded_to_the_engine() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_output("out");
        let engine = FakeEngine::writing(vec![]);
        let mut reporter = RecordingReporter::default();

        execute_build(
            &config,
            root.path(),
            Some("analytics"),
            &engine,
            &mut reporter,
        )
        .expect("build");

        let requests = engine.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].connection.as_deref(), Some("analytics"));
        assert_eq!(requests[0].sql_dir, root.path().join("out"));
    }

    #[test]
    fn envelope_mirrors_summary() {
        let summary = BuildSummary {
            sql_dir: PathBuf::from("/proj/out"),
            sql_files: 2,
            generated: vec![PathBuf::from("/proj/out/a.sql")],
            merged_maps: vec!["schema.map".to_owned()],
            merge_failures: vec![MergeFailure {
                file: "broken.map".to_owned(),
                detail: "permission denied".to_owned(),
            }],
        };
        let envelope = BuildEnvelope::from(&summary);
        assert_eq!(envelope.sql_files, 2);
        assert_eq!(envelope.generated, vec!["/proj/out/a.sql".to_owned()]);
        assert_eq!(envelope.merged_maps, vec!["schema.map".to_owned()]);
        assert_eq!(envelope.merge_failures.len(), 1);

        let json = serde_json::to_string(&envelope).expect("serialize");
        assert!(json.contains("\"sql_files\":2"));
    }
}
