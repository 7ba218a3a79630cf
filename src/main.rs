use anyhow::Result;
use clap::{Parser, Subcommand};
use daybrief::cli::setup::setup;
use daybrief::core::log::init_logging;
use daybrief::core::model::Operation;
use daybrief::{AppCommand, Overrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Serve every category from the local store
    #[arg(long, global = true)]
    cache_only: bool,

    /// Currency tracked for change alerts and the report trend
    #[arg(long, global = true)]
    currency: Option<String>,

    /// Side of the quote shown in the report trend
    #[arg(long, global = true, value_enum)]
    operation: Option<Operation>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Refresh everything and send the daily report (default)
    Report,
    /// Refresh prayer times only
    UpdateNamaz,
    /// Refresh exchange rates inside the update window
    UpdateCurrency,
    /// Send an image to every recipient
    SendPhoto {
        path: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Report => AppCommand::Report,
            Commands::UpdateNamaz => AppCommand::UpdateNamaz,
            Commands::UpdateCurrency => AppCommand::UpdateCurrency,
            Commands::SendPhoto { path, caption } => AppCommand::SendPhoto { path, caption },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let overrides = Overrides {
        cache_only: cli.cache_only,
        currency: cli.currency,
        operation: cli.operation,
    };

    let result = match cli.command.unwrap_or(Commands::Report) {
        Commands::Setup => setup(),
        cmd => daybrief::run_command(cmd.into(), cli.config_path.as_deref(), &overrides).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
