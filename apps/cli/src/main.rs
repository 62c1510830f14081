//! hashdrop command-line uploader.

mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hashdrop", version, about = "Upload files to a hashdrop store")]
struct Cli {
    /// Backend API base URL (overrides the config file)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Access token (overrides the config file)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload one or more files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination folder id
        #[arg(long)]
        folder: Option<i64>,
    },
    /// Upload new content for an existing file record
    Replace { file_id: i64, file: PathBuf },
    /// Release an open chunk session
    Abort { upload_id: String },
    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load()?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(token) = cli.token {
        config.access_token = Some(token);
    }
    tracing::debug!(api_base = %config.api_base, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.command, config))
}
