use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use forest_sql::{
    Catalogue, ConfigError, EngineConfig, Fixture, FixtureError, QueryOutcome, check_answer,
    execute,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error("fixture file {} contains no levels", .0.display())]
    EmptyCatalogue(PathBuf),
    #[error("could not render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(
    name = "forest_sql",
    about = "Run and grade learner SQL against forest level fixtures"
)]
struct Cli {
    /// Engine configuration file (JSON). FOREST_SQL_ORDER_SENSITIVE overrides it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a query against a level's tables and print the rows.
    Run(RunArgs),
    /// Grade a query against a level's reference solution.
    Check(CheckArgs),
    /// List the levels in a fixture file.
    Levels {
        #[arg(long, value_name = "FILE")]
        fixture: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, value_name = "FILE")]
    fixture: PathBuf,
    /// Level id; defaults to the first level in the file.
    #[arg(long)]
    level: Option<String>,
    query: String,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long, value_name = "FILE")]
    fixture: PathBuf,
    #[arg(long)]
    level: String,
    query: String,
}

#[derive(Serialize)]
struct LevelSummary<'a> {
    id: &'a str,
    title: &'a str,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "engine configuration");

    match cli.command {
        Command::Run(args) => {
            let catalogue = load_catalogue(&args.fixture)?;
            let level = select_level(&catalogue, &args.fixture, args.level.as_deref())?;
            let outcome = QueryOutcome::from(execute(&args.query, &level.tables));
            print_json(&outcome)?;
            Ok(exit_code(!outcome.is_error()))
        }
        Command::Check(args) => {
            let catalogue = load_catalogue(&args.fixture)?;
            let level = catalogue.find(&args.level)?;
            let verdict = check_answer(&args.query, &level.solution, &level.tables, &config);
            print_json(&verdict)?;
            Ok(exit_code(verdict.passed))
        }
        Command::Levels { fixture } => {
            let catalogue = load_catalogue(&fixture)?;
            let summaries: Vec<LevelSummary<'_>> = catalogue
                .levels()
                .iter()
                .map(|level| LevelSummary {
                    id: &level.id,
                    title: &level.title,
                })
                .collect();
            print_json(&summaries)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()
}

fn load_catalogue(path: &Path) -> Result<Catalogue, FixtureError> {
    let catalogue = Catalogue::from_file(path)?;
    debug!(
        levels = catalogue.len(),
        heap_bytes = catalogue
            .levels()
            .iter()
            .map(|level| level.tables.heap_size())
            .sum::<usize>(),
        "fixture loaded"
    );
    Ok(catalogue)
}

fn select_level<'c>(
    catalogue: &'c Catalogue,
    path: &Path,
    id: Option<&str>,
) -> Result<&'c Fixture, CliError> {
    match id {
        Some(id) => Ok(catalogue.find(id)?),
        None => catalogue
            .first()
            .ok_or_else(|| CliError::EmptyCatalogue(path.to_path_buf())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
