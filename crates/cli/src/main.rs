//! SiteCheck CLI - Main Entry Point
//!
//! Runs link audits and store-search fuzz scenarios and reports the results.
//! Exit code 0 when everything passed, 1 when any check failed, 2 when the
//! harness itself could not run.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sitecheck_cli::commands::{self, check, init, links, list, run, Context};
use sitecheck_cli::output::{self, print_error};

/// SiteCheck - link and input validation harness
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, global = true, env = "SITECHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenarios and write test-results.json
    Run(run::RunArgs),

    /// Probe link catalogs over HTTP (no browser)
    Links(links::LinksArgs),

    /// List scenarios
    List(list::ListArgs),

    /// Check an App Store link against the domain policy
    CheckFormat(check::CheckFormatArgs),

    /// Write a default config file
    Init(init::InitArgs),
}

async fn dispatch(command: Commands, ctx: &Context) -> anyhow::Result<bool> {
    match command {
        Commands::Run(args) => run::execute(args, ctx).await,
        Commands::Links(args) => links::execute(args, ctx).await,
        Commands::List(args) => list::execute(args, ctx),
        Commands::CheckFormat(args) => check::execute(args, ctx),
        Commands::Init(args) => init::execute(args, ctx),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context::new(cli.config, cli.format);

    match dispatch(cli.command, &ctx).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
