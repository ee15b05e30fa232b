use anyhow::{Context, Result};

use crate::runner::DEFAULT_CHUNK_SIZE;

pub const DEFAULT_SCHEMA: &str = "imobiliario";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Settings read once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_url: Option<String>,
    pub schema: String,
    pub chunk_size: usize,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            db_url: non_empty("DB_URL"),
            schema: non_empty("PGSCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            chunk_size: non_empty("CHUNK_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            max_connections: non_empty("DB_MAX_CONNECTIONS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        }
    }

    pub fn db_url(&self) -> Result<&str> {
        self.db_url.as_deref().context("DB_URL env var missing")
    }
}
