/*
[INPUT]:  CLI arguments, YAML configuration file, environment, OS shutdown signals
[OUTPUT]: Private order and balance events as JSON lines on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use deribit_adapter::{UserStreamSession, WsConnector, event_queue};
use deribit_user_stream::{StreamConfig, forward_events};

#[derive(Parser, Debug)]
#[command(name = "deribit-user-stream", version, about = "Deribit private user stream")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = init_tracing(&args.log_level, args.log_file.as_ref())?;

    info!(
        config_path = ?args.config_path,
        dry_run = args.dry_run,
        "starting deribit-user-stream"
    );

    let config = StreamConfig::load(args.config_path.as_deref()).context("load config")?;
    info!(domain = %config.domain, client_id = %config.client_id, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let auth = config.auth()?;
    let (sender, events) = event_queue();
    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let session = UserStreamSession::new(
        WsConnector,
        auth,
        config.session_config(),
        sender,
        shutdown.clone(),
    );
    let session_handle = tokio::spawn(session.run());
    let consumer_handle = tokio::spawn(forward_events(events, tokio::io::stdout()));
    info!("user stream started");

    let session_result = session_handle.await.context("join session task")?;
    // The session owned the only sender, so the consumer drains and ends.
    let forwarded = consumer_handle
        .await
        .context("join consumer task")?
        .context("forward events")?;
    info!(forwarded, "user stream shutdown complete");

    session_result.context("user stream session")
}

fn init_tracing(log_level: &str, log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // stdout carries the event stream, so logs go to stderr or the file.
    let guard = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Some(guard)
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            None
        }
    };
    Ok(guard)
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
