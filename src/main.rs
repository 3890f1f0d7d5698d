// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::{Parser, Subcommand};
use lingod::config::BrokerConfig;
use lingod::BrokerContext;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "lingod",
    about = "lingod — language-intelligence broker daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for config and snippet files
    #[arg(long, env = "LINGOD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LINGOD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "LINGOD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker (default when no subcommand given).
    ///
    /// Runs lingod in the foreground until SIGTERM or Ctrl-C, then drains
    /// every running engine before exiting.
    ///
    /// Examples:
    ///   lingod serve
    ///   lingod
    Serve,
    /// Print the configured completer table.
    ///
    /// Shows every registered completer with the file types routed to it.
    ///
    /// Examples:
    ///   lingod completers
    Completers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let config = BrokerConfig::new(args.data_dir, args.log);
    let _file_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    match args.command {
        Some(Command::Completers) => {
            let ctx = BrokerContext::initialize(config);
            for (name, filetypes) in ctx.registry.table() {
                println!("{name}: {}", filetypes.join(", "));
            }
        }
        None | Some(Command::Serve) => {
            run_server(config).await?;
        }
    }

    Ok(())
}

async fn run_server(config: BrokerConfig) -> Result<()> {
    let ctx = BrokerContext::initialize(config);
    for (name, filetypes) in ctx.registry.table() {
        info!(completer = %name, filetypes = %filetypes.join(","), "completer registered");
    }
    info!(
        data_dir = %ctx.config.data_dir.display(),
        started_at = %ctx.started_at,
        "lingod running — engines start lazily on first parse event"
    );

    shutdown_signal().await;

    info!("shutdown requested, draining subservers");
    ctx.shutdown().await;
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C (Ctrl-C only on non-Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(err = %e, "SIGTERM handler failed, falling back to Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("lingod.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
