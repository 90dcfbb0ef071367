use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onair::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "onair",
    version,
    about = "Unattended radio orchestrator feeding a playback queue",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables override it
    #[arg(short, long, global = true, env = "ONAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration loop
    Run,

    /// Resolve free text against the music library
    Resolve {
        /// Track text, e.g. "Artist - Title"
        text: String,
    },

    /// Show the schedule state
    Schedule {
        /// Evaluate at this time of day instead of now (HH:MM)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show pool contents
    Pools {
        /// Only this show
        #[arg(short, long)]
        show: Option<String>,

        /// Entries to list per show
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show recent wishlist entries
    Wishlist {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the low-queue signal, or raise it by hand
    Signal {
        /// Raise the signal
        #[arg(long, default_value = "false")]
        raise: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    tracing::info!(station = %config.station.name, "onair starting");

    match cli.command {
        Commands::Run => {
            tracing::info!(
                queue = %config.paths.queue.display(),
                library = %config.paths.library.display(),
                "Starting run command"
            );
            commands::run(config).await?;
        }

        Commands::Resolve { text } => {
            tracing::info!(text = %text, "Starting resolve command");
            commands::resolve(config, text).await?;
        }

        Commands::Schedule { at } => {
            commands::schedule(config, at).await?;
        }

        Commands::Pools { show, limit } => {
            commands::pools(config, show, limit).await?;
        }

        Commands::Wishlist { limit } => {
            commands::wishlist(config, limit).await?;
        }

        Commands::Signal { raise } => {
            commands::signal(config, raise).await?;
        }
    }

    Ok(())
}

/// File (if given) over defaults, then environment overrides, then validation
///
/// Every configured path comes out absolute.
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env().context("Invalid environment override")?;
    config
        .absolutize_paths()
        .context("Cannot resolve configured paths")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("onair=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("onair={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
