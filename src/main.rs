use anyhow::Result;
use clap::{Parser, Subcommand};

use sqlforge::{build, doctor, telemetry};

/// Schema-to-SQL build runner
///
/// sqlforge drives an external schema build engine to regenerate the
/// SQL output directory, then reconciles the results: regenerated .map
/// files are merged with their previous contents so mapping state
/// survives across builds, and the produced SQL artifacts are counted
/// and reported.
///
/// QUICK START:
///
///   # sqlforge.toml
///   [engine]
///   command = "./tools/build-sql.sh"
///
///   sqlforge build
///   sqlforge build --connection analytics
///
/// The engine command runs via `sh -c` in the project root and receives
/// SQLFORGE_TASK, SQLFORGE_SQL_DIR and SQLFORGE_CONNECTION in its
/// environment.
#[derive(Parser)]
#[command(name = "sqlforge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'sqlforge <command> --help' for more information on a specific command.")]
struct Cli {
    /// Show engine output on failure and enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the SQL generation code for all schemas
    Build(build::BuildArgs),

    /// Check configuration and build engine availability
    ///
    /// Verifies that sqlforge.toml parses, that an engine command is
    /// configured and resolvable, and shows the resolved SQL output
    /// directory.
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    match cli.command {
        Commands::Build(ref args) => build::run(args, cli.verbose),
        Commands::Doctor => doctor::run(),
    }
}
