use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use dice_room::{
    client,
    config::{
        AppConfig,
        Args,
    },
};
use std::{
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// The terminal belongs to the UI, so logs go to a daily file.
fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "dice-room.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {err}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = AppConfig::try_from(Args::parse())?;
    init_tracing(&app_config.log_dir)?;
    tracing::info!("starting dice-room client");
    client::run_app(app_config).await
}
