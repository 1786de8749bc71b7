use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use deckview::{commands, config, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_tracing();

    let state = Arc::new(AppState::new());

    // Reconnect with whatever was persisted, unless it is still the
    // placeholder config from a fresh install.
    let saved = commands::get_config(&state);
    if !saved.is_placeholder() {
        if let Err(e) = commands::connect_server(&state, saved).await {
            warn!("startup connect failed: {e}");
        }
    }

    tokio::spawn(deckview::run(state));

    info!("deckview running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = config::log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "deckview.log"));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(file_writer.and(std::io::stderr))
        .init();

    guard
}
