//! Shared test helpers for sqlforge integration tests.
//!
//! All tests run the real binary inside isolated temp directories.
//! The build engine is a plain shell script so each test controls
//! exactly what the "external build" produces.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Create a project directory whose engine is `engine.sh` with the
/// given body, wired up through `sqlforge.toml`.
pub fn setup_project(engine_script: &str) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join("engine.sh"), engine_script)
        .expect("failed to write engine script");
    std::fs::write(
        dir.path().join("sqlforge.toml"),
        "[engine]\ncommand = \"sh engine.sh\"\n",
    )
    .expect("failed to write sqlforge.toml");
    dir
}

/// The default SQL output directory inside a project.
pub fn sql_dir(project: &Path) -> PathBuf {
    project.join(".sqlforge").join("cache").join("sql")
}

/// Run sqlforge with the given args in the given directory.
pub fn sqlforge_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sqlforge"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to execute sqlforge")
}

/// Run sqlforge and assert it succeeds. Returns stdout as string.
pub fn sqlforge_ok(dir: &Path, args: &[&str]) -> String {
    let out = sqlforge_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "sqlforge {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run sqlforge and assert it fails. Returns stderr as string.
pub fn sqlforge_fails(dir: &Path, args: &[&str]) -> String {
    let out = sqlforge_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected sqlforge {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
