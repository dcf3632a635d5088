use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub embedding_url: String,
    /// Optional path to a taxonomy JSON file; the built-in catalog is used
    /// when unset. Also the source for POST /api/v1/taxonomy/reload.
    pub taxonomy_path: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub stage_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            embedding_url: require_env("EMBEDDING_URL")?,
            taxonomy_path: std::env::var("TAXONOMY_PATH").ok(),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            worker_count: parse_env("EVAL_WORKERS", 4)?,
            queue_capacity: parse_env("EVAL_QUEUE_CAPACITY", 64)?,
            stage_timeout_secs: parse_env("STAGE_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("'{key}' must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
