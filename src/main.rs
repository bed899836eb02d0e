// src/main.rs
// aider API server and chat client

use anyhow::{Context, Result};
use aider_api::chat::{self, ChatClient};
use aider_api::config::{FileConfig, Overrides, Settings};
use aider_api::server::{self, AppState};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "aider-api")]
#[command(about = "Run the aider API server")]
#[command(version)]
struct Cli {
    /// Host to listen on (default: 127.0.0.1)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on (default: 8000)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Path to the aider executable
    #[arg(long, env = "AIDER_BIN")]
    aider_bin: Option<PathBuf>,

    /// Config file (default: ~/.aider-api/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Interactive chat with a running server
    Chat {
        /// Disable streaming mode
        #[arg(long)]
        no_stream: bool,

        /// Initial files to edit
        files: Vec<PathBuf>,
    },
}

fn init_logging(settings: &Settings, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &settings.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry AIDER_BIN, RUST_LOG and the model keys aider itself reads
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        Overrides {
            host: cli.host,
            port: cli.port,
            aider_bin: cli.aider_bin,
            log_file: cli.log_file,
            log_level: cli.log_level,
        },
        file,
    );

    match cli.command {
        None | Some(Commands::Serve) => {
            let level = settings.log_level.clone();
            init_logging(&settings, &level)?;
            server::serve(AppState::new(settings)).await?;
        }
        Some(Commands::Chat { no_stream, files }) => {
            // keep the prompt clean
            init_logging(&settings, "warn")?;
            let files = chat::load_files(&files)?;
            let client = ChatClient::new(&settings.host, settings.port, files, !no_stream);
            chat::run(client).await?;
        }
    }

    Ok(())
}
