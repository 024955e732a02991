//! RoboSanta - engagement and playback coordinator
//!
//! CLI entry point for running the coordinator and inspecting its queue.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use robosanta::cli::{Cli, Command, OutputFormat, get_log_path};
use robosanta::config::Config;
use robosanta::coordinator::Coordinator;
use robosanta::detection::PresenceScript;
use robosanta::engagement::EngagementPolicy;
use robosanta::motion::LoggingMotion;
use robosanta::{MotionSink, create_player};
use segmentqueue::SegmentQueue;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { script } => cmd_run(&config, script.as_deref()).await,
        Command::Status { format } => cmd_status(&config, format),
        Command::Config => cmd_config(&config),
    }
}

fn open_queue(config: &Config) -> Result<SegmentQueue> {
    let queue = SegmentQueue::open(&config.queue.dir)
        .context(format!("Failed to open queue at {}", config.queue.dir.display()))?;
    Ok(queue.with_archive_keep(config.queue.archive_keep))
}

async fn cmd_run(config: &Config, script: Option<&Path>) -> Result<()> {
    let script = script
        .map(PresenceScript::load)
        .transpose()
        .context("Failed to load presence script")?;

    let queue = open_queue(config)?;
    let audio = create_player(&config.audio).context("Failed to open audio output")?;
    let motion: Arc<dyn MotionSink> = Arc::new(LoggingMotion);

    let coordinator = Coordinator::new(
        config.coordinator.clone(),
        EngagementPolicy::from_config(&config.engagement),
        queue,
        audio,
        motion,
    );
    let handle = coordinator.handle();
    let coordinator_task = tokio::spawn(coordinator.run());

    let detector = script.map(|script| {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = script.run(handle).await {
                warn!(error = %e, "Presence script stopped");
            }
        })
    });

    println!("{} Coordinator running on {}", "✓".green(), config.queue.dir.display().to_string().cyan());
    println!("  Logs: {}", get_log_path().display().to_string().dimmed());

    wait_for_signal().await;
    info!("Shutdown signal received");

    if let Some(detector) = detector {
        detector.abort();
    }
    if let Err(e) = handle.shutdown().await {
        debug!(error = %e, "cmd_run: coordinator already stopped");
    }
    coordinator_task.await.context("Coordinator task failed")?;

    println!("{} Coordinator stopped", "✓".green());
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    let queue = open_queue(config)?;
    let snapshot = queue.snapshot();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize status")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("Queue: {}", config.queue.dir.display().to_string().cyan());
            println!("  Pending: {}", snapshot.pending);
            println!("  Checked out: {}", snapshot.checked_out);
            println!("  Archived: {}", snapshot.archived);
            match snapshot.next {
                Some(id) => println!("  Next: {}", id.yellow()),
                None => println!("  Next: {}", "none".dimmed()),
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
