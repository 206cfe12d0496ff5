//! `sqlforge doctor` — configuration and environment checks.

use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::config::{BuildConfig, CONFIG_FILE_NAME};

pub fn run() -> Result<()> {
    println!("Checking sqlforge setup...");
    println!();

    let root = std::env::current_dir().context("Failed to resolve current directory")?;
    let config_path = root.join(CONFIG_FILE_NAME);

    let config = match BuildConfig::load(&config_path) {
        Ok(config) => {
            if config_path.exists() {
                println!("[OK] {CONFIG_FILE_NAME} is valid");
            } else {
                println!("[OK] no {CONFIG_FILE_NAME} found, using defaults");
            }
            config
        }
        Err(err) => {
            println!("[FAIL] {err}");
            bail!("Configuration is invalid. Fix {CONFIG_FILE_NAME} and re-run.");
        }
    };

    match &config.engine.command {
        Some(command) => {
            println!("[OK] engine command configured: {command}");
            match engine_resolvable(command) {
                Some(true) => println!("[OK] engine command resolves"),
                Some(false) => println!(
                    "[WARN] engine command does not resolve, check that it is installed"
                ),
                None => println!("[WARN] could not probe the engine command"),
            }
        }
        None => {
            println!(
                "[WARN] no engine command configured, set [engine] command in {CONFIG_FILE_NAME}"
            );
        }
    }

    println!("[OK] SQL output directory: {}", config.sql_dir(&root).display());

    println!();
    println!("Next: sqlforge build");

    Ok(())
}

/// Probe whether the first token of the engine command resolves to an
/// executable. `None` means the probe itself could not run.
fn engine_resolvable(command: &str) -> Option<bool> {
    let token = command.split_whitespace().next()?;
    let output = Command::new("sh")
        .args(["-c", &format!("command -v -- {token}")])
        .output()
        .ok()?;
    Some(output.status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_builtin_resolves() {
        assert_eq!(engine_resolvable("sh build.xml"), Some(true));
    }

    #[test]
    fn missing_binary_does_not_resolve() {
        assert_eq!(
            engine_resolvable("definitely-not-a-real-binary-9183"),
            Some(false)
        );
    }

    #[test]
    fn empty_command_has_no_token() {
        assert_eq!(engine_resolvable("   "), None);
    }
}
