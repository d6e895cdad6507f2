//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod catalog;
mod daemon;
mod helpers;
mod init;
mod notify;
mod queue;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mangawatch::config::Settings;

#[derive(Parser)]
#[command(name = "mangawatch")]
#[command(about = "Manga catalog scraper and restock monitor")]
#[command(version)]
pub struct Cli {
    /// Config file path (discovered in the standard locations when omitted)
    #[arg(short, long, global = true, env = "MANGAWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the database (overrides config file)
    #[arg(long, global = true, env = "MANGAWATCH_DATA_DIR")]
    data: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Queue product URLs for ingestion
    Add {
        /// URLs to queue; `-` reads them from stdin, one per line
        urls: Vec<String>,
        /// Read URLs from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List URLs waiting to be ingested
    Queue,

    /// Ingest every queued URL once
    Ingest {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check unavailable products for restocks once
    Monitor {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the product catalog
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ingestion and monitoring on their intervals until Ctrl-C
    Daemon,

    /// Send a test message through the configured notifier
    NotifyTest {
        /// Message text
        message: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.data.as_deref()).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Add { urls, file } => queue::cmd_add(&settings, &urls, file.as_deref()).await,
        Commands::Queue => queue::cmd_queue(&settings).await,
        Commands::Ingest { json } => run::cmd_ingest(&settings, json).await,
        Commands::Monitor { json } => run::cmd_monitor(&settings, json).await,
        Commands::List { json } => catalog::cmd_list(&settings, json).await,
        Commands::Daemon => daemon::cmd_daemon(&settings).await,
        Commands::NotifyTest { message } => {
            notify::cmd_notify_test(&settings, message.as_deref()).await
        }
    }
}
