use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use query_distributed::DispatchConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::*;

#[derive(Parser)]
#[command(name = "qctx")]
#[command(author, version, about = "Query context inspector - decode dispatched catalog contexts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a spilled query context file
    Inspect {
        /// Context file
        file: PathBuf,

        /// Also rebuild the catalog mirror as this segment would
        #[arg(short, long, allow_negative_numbers = true)]
        segindex: Option<i32>,
    },

    /// Decode a send-back message
    Sendback {
        /// Message file
        file: PathBuf,
    },

    /// Write the default configuration
    InitConfig {
        /// Output path
        #[arg(default_value = "qctx.json")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        DispatchConfig::from_file(&config_path)?
    } else {
        DispatchConfig::default()
    };

    print_banner();

    match cli.command {
        Commands::Inspect { file, segindex } => {
            inspect_context(&file, segindex, &config)?;
        }
        Commands::Sendback { file } => {
            decode_sendback(&file)?;
        }
        Commands::InitConfig { path } => {
            write_default_config(&path)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "query_cli=debug,query_distributed=debug,query_catalog=debug"
    } else {
        "query_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        "qctx - query context inspector v0.1.0".bright_yellow()
    );
    println!();
}
