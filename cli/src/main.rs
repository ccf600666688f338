// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ASHA Health Memory CLI
//!
//! The `asha` binary drives the health memory core in-process: it loads the
//! configuration, wires the configured vector store and embedding provider,
//! and runs one command.
//!
//! ## Commands
//!
//! - `asha record` - Record a statement and evolve the user's memory
//! - `asha search` - Retrieve ranked evidence for a query
//! - `asha trend` - Show a user's history and deterioration check
//! - `asha dashboard` - List users whose latest risk is high
//! - `asha init` / `asha seed` - Create collections and load reference data
//! - `asha config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use asha_cli::commands::{
    self, ConfigCommand, DashboardArgs, RecordArgs, SearchArgs, SeedArgs, TrendArgs,
};

/// ASHA health memory - longitudinal risk tracking for community health workers
#[derive(Parser)]
#[command(name = "asha")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ASHA_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ASHA_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a health statement for a user
    #[command(name = "record")]
    Record(RecordArgs),

    /// Retrieve ranked evidence for a query
    #[command(name = "search")]
    Search(SearchArgs),

    /// Show a user's history and trend
    #[command(name = "trend")]
    Trend(TrendArgs),

    /// List users with high recent risk
    #[command(name = "dashboard")]
    Dashboard(DashboardArgs),

    /// Create the vector store collections
    #[command(name = "init")]
    Init,

    /// Load reference knowledge and nutrition data
    #[command(name = "seed")]
    Seed(SeedArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Record(args)) => commands::record::execute(args, cli.config).await,
        Some(Commands::Search(args)) => commands::search::execute(args, cli.config).await,
        Some(Commands::Trend(args)) => commands::trend::execute(args, cli.config).await,
        Some(Commands::Dashboard(args)) => commands::dashboard::execute(args, cli.config).await,
        Some(Commands::Init) => commands::seed::init(cli.config).await,
        Some(Commands::Seed(args)) => commands::seed::execute(args, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
