//! Binary entry point for polystore.
//!
//! Runs one data command against the configured backend and prints the
//! result as JSON.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use polystore::Client;
use polystore::cli::{CrudCommand, load_client_config};
use polystore::observability::{self, LogFormat, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Polystore - one CRUD contract over relational, document and key-value stores.
#[derive(Parser)]
#[command(name = "polystore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Connection string (overrides the configuration file).
    #[arg(short, long, global = true, env = "POLYSTORE_URL", hide_env_values = true)]
    url: Option<String>,

    /// Log format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: CrudCommand,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_env(cli.verbose, cli.log_format);
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command and renders its output.
fn run(cli: &Cli) -> polystore::Result<String> {
    let config = load_client_config(cli.config.as_deref(), cli.url.as_deref())?;
    let mut client = Client::new(config);
    let output = cli.command.execute(&mut client)?;
    serde_json::to_string_pretty(&output)
        .map_err(|e| polystore::Error::driver("serialize_output", e))
}
