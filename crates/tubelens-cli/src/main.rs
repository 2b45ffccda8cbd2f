//! tubelens command-line tool.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "tubelens")]
#[command(about = "Video metadata research: AI completions and transcripts with failover")]
struct Cli {
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show completion provider status
    Providers {
        /// Send a test message to every provider
        #[arg(long)]
        probe: bool,

        /// Message used when probing
        #[arg(long, default_value = "Hello! This is a test message. Please reply briefly.")]
        message: String,
    },

    /// Send a prompt through the provider failover chain
    Complete {
        prompt: String,

        /// Optional system message
        #[arg(long)]
        system: Option<String>,

        /// Skip the completion cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Fetch a transcript for a video id or URL
    Transcript {
        video: String,

        /// Preferred languages, most preferred first
        #[arg(long = "lang", value_delimiter = ',', default_values_t = ["tr".to_string(), "en".to_string()])]
        langs: Vec<String>,

        /// Skip the transcript cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Show or change offline mode
    Offline {
        #[arg(value_enum, default_value_t = OfflineAction::Status)]
        action: OfflineAction,
    },

    /// Maintain the SQLite cache
    Cache {
        #[arg(value_enum)]
        action: CacheAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OfflineAction {
    On,
    Off,
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum CacheAction {
    Stats,
    Cleanup,
    Clear,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubelens=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Providers { probe, message } => commands::providers(&config, probe, &message, cli.json).await,
        Command::Complete {
            prompt,
            system,
            no_cache,
        } => commands::complete(&config, &prompt, system.as_deref(), no_cache, cli.json).await,
        Command::Transcript {
            video,
            langs,
            no_cache,
        } => commands::transcript(&config, &video, &langs, no_cache, cli.json).await,
        Command::Offline { action } => {
            let on = match action {
                OfflineAction::On => Some(true),
                OfflineAction::Off => Some(false),
                OfflineAction::Status => None,
            };
            commands::offline(&config, on, cli.json)
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => commands::cache_stats(&config, cli.json),
            CacheAction::Cleanup => commands::cache_cleanup(&config),
            CacheAction::Clear => commands::cache_clear(&config),
        },
    }
}
