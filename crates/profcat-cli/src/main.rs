use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::context::{CliContext, init_logging};

#[derive(Parser)]
#[command(name = "profcat")]
#[command(about = "PROFCAT - profiling session catalog", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of spooled imported streams, overriding the config
    #[arg(long, global = true)]
    spool: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the catalog in display order
    List {
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import heap dumps (.hprof) or CPU traces (.trace) as sessions
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a session and its events
    Delete { session_id: i64 },
    /// Reconcile continuously and report catalog changes until Ctrl-C
    Watch {
        /// Poll interval in milliseconds (config `poll_interval_ms` by default)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Profile a synthetic process while watching
        #[arg(long)]
        demo: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration if no file exists
    Init,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config, cli.spool)?;
    init_logging(&ctx.config.log_filter, cli.json_logs);

    match cli.command {
        Commands::List { json } => commands::catalog::list(&ctx, json).await?,
        Commands::Import { files } => commands::catalog::import(&ctx, &files).await?,
        Commands::Delete { session_id } => commands::catalog::delete(&ctx, session_id).await?,
        Commands::Watch { interval_ms, demo } => {
            commands::watch::run(&ctx, interval_ms, demo).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&ctx)?,
            ConfigAction::Init => commands::config::init(&ctx)?,
            ConfigAction::Path => commands::config::path(&ctx),
        },
    }

    Ok(())
}
