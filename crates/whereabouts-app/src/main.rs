//! Whereabouts application binary - composition root.
//!
//! 1. Load configuration from TOML, then environment overrides
//! 2. Open the SQLite database
//! 3. Build the dialog engine over the storage and spreadsheet backends
//! 4. Sweep idle sessions in the background
//! 5. Serve the console transport until EOF or Ctrl-C

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;

use whereabouts_core::clock::{Clock, SystemClock};
use whereabouts_core::config::WhereaboutsConfig;
use whereabouts_core::types::{ChatId, UserId};
use whereabouts_dialog::{Backends, DialogEngine, DialogOptions};
use whereabouts_sheets::XlsxSpreadsheets;
use whereabouts_storage::{Database, SqliteDirectory, SqliteStatusStore};

use cli::CliArgs;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Periodically drop sessions that outlived their TTL.
async fn session_sweeper(engine: Arc<DialogEngine>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        match engine.purge_expired() {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Expired sessions dropped"),
            Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Read before tracing so the configured level applies.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = if config_file.exists() {
        match WhereaboutsConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (WhereaboutsConfig::default(), Some(e)),
        }
    } else {
        (WhereaboutsConfig::default(), None)
    };
    config.apply_env_overrides();

    // Tracing. Logs go to stderr, stdout carries the conversation.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Whereabouts v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
    }

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.storage.db_path(&data_dir));
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let clock: Arc<dyn Clock> =
        Arc::new(SystemClock::with_offset_hours(config.general.utc_offset_hours));
    let directory = SqliteDirectory::new(Arc::clone(&db));
    tracing::info!(people = directory.count()?, "Roster loaded");

    let backends = Backends {
        directory: Arc::new(directory),
        store: Arc::new(SqliteStatusStore::new(Arc::clone(&db), Arc::clone(&clock))),
        sheets: Arc::new(XlsxSpreadsheets),
        clock,
    };
    let options = DialogOptions::from_config(&config, &data_dir);
    if options.access.is_empty() {
        tracing::warn!("No administrators configured; privileged commands are disabled");
    }
    let engine = Arc::new(DialogEngine::new(backends, options));

    // === Background tasks ===

    tokio::spawn(session_sweeper(Arc::clone(&engine)));

    // === Console transport ===

    let chat = ChatId(args.chat_id);
    let sender = UserId(args.user_id);
    tracing::info!(chat = chat.0, sender = sender.0, "Console transport ready");

    tokio::select! {
        result = console::run(Arc::clone(&engine), chat, sender, args.json) => {
            result?;
            tracing::info!("Input closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
