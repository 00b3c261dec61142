//! Storefront - Self-hosted storefront and order service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::auth::AuthKeys;
use storefront::bus::EventBus;
use storefront::config::Config;
use storefront::http::{self, AppState};
use storefront::store::postgres::PgStorage;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let bus = EventBus::connect(config.nats_url.as_deref()).await;
    let auth = AuthKeys::new(&config.jwt_secret, config.token_ttl_secs);
    let state = AppState::new(Arc::new(PgStorage::new(db)), bus, auth);
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("🚀 storefront listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
