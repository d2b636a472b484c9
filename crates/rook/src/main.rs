//! # rook
//!
//! Game session server binary. Wires the store, the chess oracle, and the
//! WebSocket server together and runs until interrupted.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rook_chess::ChessOracle;
use rook_server::config::ServerConfig;
use rook_server::server::GameServer;
use rook_settings::RookSettings;
use rook_store::{ConnectionConfig, MemorySessionStore, SessionStore, SqliteSessionStore};

/// rook game session server.
#[derive(Parser, Debug)]
#[command(name = "rook", about = "Turn-based game session server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file (default `~/.rook/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep sessions in memory only.
    #[arg(long)]
    ephemeral: bool,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Load settings and fold command-line overrides into them.
    fn settings(&self) -> Result<RookSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(rook_settings::settings_path);
        let mut settings = rook_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref db_path) = self.db_path {
            settings.store.db_path = db_path.to_string_lossy().into_owned();
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(settings: &RookSettings, ephemeral: bool) -> Result<Arc<dyn SessionStore>> {
    if ephemeral {
        tracing::warn!("ephemeral mode: sessions will not survive a restart");
        return Ok(Arc::new(MemorySessionStore::new()));
    }

    let db_path = Path::new(&settings.store.db_path);
    ensure_parent_dir(db_path)?;
    let config = ConnectionConfig {
        pool_size: settings.store.pool_size,
        busy_timeout_ms: settings.store.busy_timeout_ms,
    };
    let pool = rook_store::new_file(&settings.store.db_path, &config)
        .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let applied = rook_store::run_migrations(&conn).context("Failed to run migrations")?;
        tracing::info!(path = %db_path.display(), applied, "database ready");
    }
    Ok(Arc::new(SqliteSessionStore::new(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;

    rook_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let store = open_store(&settings, args.ephemeral)?;

    let metrics = match rook_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed, /metrics disabled");
            None
        }
    };

    let config = ServerConfig::from_settings(&settings.server);
    let server = GameServer::new(config, store, Arc::new(ChessOracle::new()), metrics);
    server.spawn_idle_reaper(
        Duration::from_secs(settings.sessions.idle_timeout_secs),
        Duration::from_secs(settings.sessions.reap_interval_secs.max(1)),
    );

    let (addr, handle) = server.listen().await.context("Failed to bind listener")?;
    tracing::info!("rook listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
