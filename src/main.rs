//! DynamoDB migration runner - command line entry point.
//!
//! Usage:
//!   dynamo-migrate upgrade [version]          Upgrade to a version (default: latest)
//!   dynamo-migrate downgrade [steps]          Revert the last N migrations (default: 1)
//!   dynamo-migrate revision <name>            Create a new migration file
//!   dynamo-migrate init                       Create the migrations directory
//!   dynamo-migrate current                    Show the applied and latest versions

use std::ffi::OsString;
use std::process;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dynamo_migrate::config::Config;
use dynamo_migrate::db::{DynamoStore, Sequencer};
use dynamo_migrate::error::{AppError, AppResult};
use dynamo_migrate::migration::Catalog;
use dynamo_migrate::models::{Direction, RunReport, UpgradeTarget, LATEST};
use dynamo_migrate::services::Scaffolder;

/// Migrations compiled from `migrations/versions/`.
mod versions {
    include!(concat!(env!("OUT_DIR"), "/versions_index.rs"));
}

#[derive(Debug, Parser)]
#[command(name = "dynamo-migrate", version, about = "Manage DynamoDB migrations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upgrade the migration to the given version
    Upgrade {
        /// The version to upgrade to, or `latest`
        #[arg(default_value = LATEST)]
        version: String,
    },
    /// Downgrade the migration by the given number of steps
    Downgrade {
        /// The number of steps to downgrade
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        number_of_steps: i64,
    },
    /// Create a new revision migration file
    Revision {
        /// The name of the migration
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Create the migrations directory
    Init,
    /// Show the applied version and the latest available version
    Current,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let command = match parse_invocation(std::env::args_os()) {
        Invocation::Run(command) => command,
        Invocation::Info(e) => e.exit(),
        Invocation::Invalid(e) => {
            if let Some(e) = e {
                let _ = e.print();
            }
            eprintln!("Invalid command");
            eprintln!("Run with --help to list the available commands.");
            process::exit(INVALID_COMMAND);
        }
    };

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Running in {} mode with version table '{}'",
        config.environment, config.version_table
    );

    let result = run(command, &config).await;
    if let Err(ref e) = result {
        report_error(e);
    }
    process::exit(exit_code(&result));
}

/// Exit code for a command line that does not name a command.
const INVALID_COMMAND: i32 = 2;

/// Outcome of parsing the command line.
#[derive(Debug)]
enum Invocation {
    Run(Command),
    /// `--help` or `--version`
    Info(clap::Error),
    /// Unknown verb, bad arguments, or no verb at all
    Invalid(Option<clap::Error>),
}

fn parse_invocation<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(Cli {
            command: Some(command),
        }) => Invocation::Run(command),
        Ok(Cli { command: None }) => Invocation::Invalid(None),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Invocation::Info(e)
        }
        Err(e) => Invocation::Invalid(Some(e)),
    }
}

fn exit_code(result: &AppResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    }
}

async fn run(command: Command, config: &Config) -> AppResult<()> {
    match command {
        Command::Upgrade { version } => {
            let target = UpgradeTarget::parse(&version)?;
            let catalog = load_catalog()?;
            let store = DynamoStore::new(&config.store);
            let sequencer = Sequencer::new(&catalog, &store, &config.version_table);
            let report = sequencer.upgrade(target).await?;
            print_report(&report);
        }
        Command::Downgrade { number_of_steps } => {
            let catalog = load_catalog()?;
            let store = DynamoStore::new(&config.store);
            let sequencer = Sequencer::new(&catalog, &store, &config.version_table);
            let report = sequencer.downgrade(number_of_steps).await?;
            print_report(&report);
        }
        Command::Revision { name } => {
            let file = Scaffolder::from_config(config).new_revision(&name.join(" "))?;
            println!("Successfully created migration file {}", file.path.display());
        }
        Command::Init => {
            let scaffolder = Scaffolder::from_config(config);
            if scaffolder.init_versions_dir()? {
                println!(
                    "Successfully set up migration structure at {}",
                    scaffolder.versions_dir().display()
                );
            } else {
                println!(
                    "Migration structure already exists at {}",
                    scaffolder.versions_dir().display()
                );
            }
        }
        Command::Current => {
            let catalog = load_catalog()?;
            let store = DynamoStore::new(&config.store);
            let sequencer = Sequencer::new(&catalog, &store, &config.version_table);
            let current = sequencer.current_version().await?;
            println!("Current version: {}", current);
            println!("Latest version:  {}", catalog.head_version());
        }
    }

    Ok(())
}

fn load_catalog() -> AppResult<Catalog> {
    let catalog = Catalog::from_registry(versions::registry())?;
    info!(
        "Loaded {} migration(s), latest version {}",
        catalog.len(),
        catalog.head_version()
    );
    Ok(catalog)
}

fn print_report(report: &RunReport) {
    if report.is_noop() {
        match report.direction {
            Direction::Upgrade => println!(
                "Version is already up to date - Current Version {}",
                report.to
            ),
            Direction::Downgrade => {
                println!("Nothing to downgrade - Current Version {}", report.to)
            }
        }
        return;
    }

    for step in &report.executed {
        println!("{} file: {}_{}", report.direction, step.version, step.slug);
    }
    println!(
        "{} complete: version {} -> {} ({} migration(s))",
        report.direction,
        report.from,
        report.to,
        report.executed.len()
    );
}

fn report_error(err: &AppError) {
    match err {
        AppError::StepFailure {
            version,
            slug,
            direction,
            completed,
            resumed_at,
            ..
        } => {
            for done in completed {
                eprintln!("{} succeeded: version {}", direction, done);
            }
            eprintln!("{} failed: {}_{}", direction, version, slug);
            eprintln!("Error: {}", err);
            eprintln!("Current version is now {}; re-run to resume.", resumed_at);
        }
        AppError::VersionNotRecorded {
            version,
            slug,
            direction,
            completed,
            resumed_at,
            ..
        } => {
            for done in completed {
                eprintln!("{} succeeded: version {}", direction, done);
            }
            eprintln!("{} ran but was not recorded: {}_{}", direction, version, slug);
            eprintln!("Error: {}", err);
            eprintln!(
                "Current version is still {}; check the effects of {}_{} before re-running.",
                resumed_at, version, slug
            );
        }
        e if e.is_validation() => eprintln!("{}", e),
        e => eprintln!("Error: {}", e),
    }
}
