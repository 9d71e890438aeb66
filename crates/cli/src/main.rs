//! CLI entry point for castcode
//!
//! `castcode coordinator` serves the job queue; `castcode worker` claims jobs
//! and encodes them on the local GPU.

use castcode::{
    probe_capabilities, run_startup_checks, run_worker, Config, Coordinator, CoordinatorClient,
    HostEnvironment, JobProcessor,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// castcode - GPU transcoding of media libraries into Chromecast renditions
#[derive(Parser, Debug)]
#[command(name = "castcode")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the job queue and HTTP API
    Coordinator {
        /// Listen address, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Claim and encode jobs from a coordinator
    Worker {
        /// Coordinator base URL, overriding the config file
        #[arg(long)]
        coordinator_url: Option<String>,

        /// Skip the ffmpeg/ffprobe preflight. For testing only.
        #[arg(long)]
        skip_checks: bool,
    },
}

/// Filter directive: `RUST_LOG`, else `--verbose`, else `LOG_LEVEL` (`VERBOSE` means debug), else info.
fn log_filter(rust_log: Option<String>, log_level: Option<String>, verbose: bool) -> String {
    if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
        return filter;
    }
    if verbose {
        return "debug".to_string();
    }
    match log_level.map(|l| l.trim().to_lowercase()) {
        Some(level) if level == "verbose" => "debug".to_string(),
        Some(level) if !level.is_empty() => level,
        _ => "info".to_string(),
    }
}

async fn run_coordinator(config: Config) -> ExitCode {
    info!(bind = %config.coordinator.bind, "Starting coordinator");
    match Coordinator::new(config).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Coordinator error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start_worker(config: Config, skip_checks: bool) -> ExitCode {
    if skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&config) {
        error!("Startup checks failed: {}", e);
        return ExitCode::FAILURE;
    }

    let host = HostEnvironment::detect();
    if host.is_wsl {
        warn!("Running under WSL; NVENC rate-control support may be reduced");
    }
    let capabilities = probe_capabilities(&config.tools.ffmpeg);

    let client = CoordinatorClient::new(
        &config.worker.coordinator_url,
        Duration::from_secs(config.worker.http_timeout_secs),
    );
    let processor = JobProcessor::from_config(&config, capabilities, host);
    let poll_interval = Duration::from_secs(config.worker.poll_interval_secs.max(1));

    run_worker(Arc::new(processor), Arc::new(client), poll_interval).await;
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = log_filter(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOG_LEVEL").ok(),
        cli.verbose,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %cli.config.display(), "Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Coordinator { bind } => {
            if let Some(bind) = bind {
                config.coordinator.bind = bind;
            }
            run_coordinator(config).await
        }
        Commands::Worker {
            coordinator_url,
            skip_checks,
        } => {
            if let Some(url) = coordinator_url {
                config.worker.coordinator_url = url;
            }
            start_worker(config, skip_checks).await
        }
    }
}
