//! LogSentry - watch log files and send rate-limited notifications.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logsentry::config::{ConfigError, ConfigLoader, LogSentryConfig};
use logsentry::notifier::{NotificationSink, SendmailSink, SimulatorSink};
use logsentry::supervisor::{ShutdownHandle, Supervisor, SupervisorOptions};
use logsentry::watcher::{ChangeEvent, ChangeSource, NotifyChangeSource, NotifySourceFactory};

/// Interval between statistics log lines.
const STATS_PERIOD: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "logsentry",
    about = "Watch log files and send rate-limited notifications",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Record notifications instead of mailing them, optionally to FILE.
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    simulate: Option<Option<PathBuf>>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn build_sink(
    config: &LogSentryConfig,
    simulate: Option<&Option<PathBuf>>,
) -> Arc<dyn NotificationSink> {
    match simulate {
        Some(path) => Arc::new(SimulatorSink::new(path.clone())),
        None => Arc::new(SendmailSink::new(
            config.sender.command.clone(),
            config.sender.from.clone(),
        )),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<LogSentryConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, |p| ConfigLoader::with_path(p.clone()));
    loader.load()
}

/// Print one line per target and report whether any target is usable.
fn check_config(config: &LogSentryConfig) -> bool {
    let mut valid = 0;
    for target in &config.targets {
        match target.validate() {
            Ok(compiled) => {
                valid += 1;
                println!(
                    "OK: {} {} \"{}\"",
                    compiled.name,
                    compiled.path.display(),
                    compiled.matcher
                );
            }
            Err(e) => println!("FAILED: {} {}: {e}", target.name, target.path.display()),
        }
    }
    valid > 0
}

fn supervisor_for(config: &LogSentryConfig, simulate: Option<&Option<PathBuf>>) -> Supervisor {
    Supervisor::with_sources(
        build_sink(config, simulate),
        Arc::new(NotifySourceFactory::new(config.settings.debounce())),
    )
    .with_options(SupervisorOptions::from(&config.settings))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

async fn next_config_event(source: &mut Option<NotifyChangeSource>) -> Option<ChangeEvent> {
    match source {
        Some(s) => s.next_event().await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Can't load configuration");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(config = %config, "Configuration loaded");

    if cli.check {
        return if check_config(&config) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let simulate = cli.simulate.as_ref();
    let mut supervisor = supervisor_for(&config, simulate);
    let mut handle: ShutdownHandle = match supervisor.start(&config.targets) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Can't start the process");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config_source = config.path.clone().and_then(|path| {
        NotifyChangeSource::new(path, config.settings.debounce())
            .map_err(|e| tracing::warn!(error = %e, "Config reload disabled"))
            .ok()
    });

    let mut stats =
        tokio::time::interval_at(tokio::time::Instant::now() + STATS_PERIOD, STATS_PERIOD);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("Process will be stopped");
                break;
            }
            event = next_config_event(&mut config_source) => {
                match event {
                    Some(ChangeEvent::Error(message)) => {
                        tracing::warn!(error = %message, "Config watcher error");
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!("Config watcher closed, reload disabled");
                        config_source = None;
                        continue;
                    }
                }

                tracing::info!("Process will be restarted due to reconfiguration");
                if let Err(e) = supervisor.stop(handle.clone()).await {
                    tracing::warn!(error = %e, "Stop before reload failed");
                }
                match load_config(config.path.as_ref()) {
                    Ok(fresh) => config = fresh,
                    Err(e) => {
                        tracing::error!(error = %e, "Reload failed, keeping previous configuration");
                    }
                }
                supervisor = supervisor_for(&config, simulate);
                handle = match supervisor.start(&config.targets) {
                    Ok(handle) => handle,
                    Err(e) => {
                        tracing::error!(error = %e, "Can't restart the process");
                        return ExitCode::FAILURE;
                    }
                };
            }
            _ = stats.tick() => {
                tracing::info!(status = %supervisor.status(), "Statistics");
            }
        }
    }

    if let Err(e) = supervisor.stop(handle).await {
        tracing::warn!(error = %e, "Stop failed");
    }
    ExitCode::SUCCESS
}
