mod analytics;
mod api;
mod cache;
mod config;
mod error;
mod models;
mod service;
mod shortcode;
mod storage;

use anyhow::Result;
use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{AppState, RateLimiter};
use cache::MappingCache;
use config::{Config, DatabaseBackend};
use service::{Shortener, ShortenerSettings};
use storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let cache = Arc::new(MappingCache::new(
        config.cache.capacity,
        Duration::from_secs(config.cache.ttl_secs),
    ));
    cache.start_sweep(Duration::from_secs(config.cache.sweep_secs));

    let shortener = Shortener::new(
        Arc::clone(&storage),
        Arc::clone(&cache),
        ShortenerSettings {
            title_backfill: config.title.backfill,
            title_fetch_timeout: Duration::from_secs(config.title.fetch_timeout_secs),
            title_fetch_max_bytes: config.title.fetch_max_bytes,
            ..ShortenerSettings::default()
        },
    )?;

    let state = Arc::new(AppState {
        shortener,
        rate_limiter: RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        ),
        redirect_status: StatusCode::from_u16(config.redirect.status)
            .unwrap_or(StatusCode::FOUND),
    });

    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tern listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
