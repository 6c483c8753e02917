// crates/server/src/main.rs

use anyhow::{Context, Result};
use ledgerline_config::{Config, ConfigManager};
use ledgerline_database::{connect, run_migrations, DatabaseConfig};
use ledgerline_server::{app_router, AppState};
use ledgerline_sync_engine::{ReconciliationEngine, SqliteRecordStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match ConfigManager::new() {
        Ok(manager) => manager.load_with_env_overrides().unwrap_or_else(|e| {
            eprintln!("Config error: {}, using defaults", e);
            Config::default()
        }),
        Err(e) => {
            eprintln!("No config directory ({}), using defaults", e);
            Config::default()
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    let db_path = config.server_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_config = DatabaseConfig::new(db_path.to_string_lossy())
        .with_max_connections(config.server.max_connections);
    let pool = connect(db_config)
        .await
        .context("Failed to open the server database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let engine = ReconciliationEngine::new(Arc::new(SqliteRecordStore::new(pool)));
    let router = app_router(AppState::new(engine));

    let bind_addr = config.server.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    log::info!("ledgerline-server listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;
    Ok(())
}
