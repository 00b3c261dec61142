//! Environment-driven configuration.

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

impl Config {
    /// Reads the configuration from the environment. Call after `dotenvy`
    /// has had a chance to load a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8083),
            nats_url: std::env::var("NATS_URL").ok(),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            token_ttl_secs: std::env::var("TOKEN_TTL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(86_400),
        })
    }
}
