use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use famtree_bot::dialog::DEFAULT_GENERATION_LIMIT;
use famtree_bot::locks::DEFAULT_LOCK_TTL_SECS;
use tracing::warn;

/// Upper bound on a configured lock TTL (one day).
const MAX_LOCK_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("unknown FAMTREE_ENVIRONMENT {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub lock_ttl_secs: i64,
    pub generation_limit: i64,
    pub twilio_auth_token: Option<String>,
    pub public_url: Option<String>,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Positive integer from the environment, or `default` with a warning.
fn positive_or(key: &str, default: i64) -> i64 {
    match var(key).map(|raw| raw.trim().parse::<i64>()) {
        None => default,
        Some(Ok(value)) if value > 0 => value,
        Some(_) => {
            warn!("{} is not a positive integer, using {}", key, default);
            default
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = var("FAMTREE_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse::<u16>()
            .context("FAMTREE_PORT must be a port number")?;
        let environment = match var("FAMTREE_ENVIRONMENT") {
            Some(raw) => raw.parse()?,
            None => Environment::Development,
        };

        Ok(Self {
            db_path: var("FAMTREE_DB_PATH").unwrap_or_else(|| "famtree.db".into()).into(),
            host: var("FAMTREE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            environment,
            lock_ttl_secs: positive_or("FAMTREE_LOCK_TTL_SECS", DEFAULT_LOCK_TTL_SECS).min(MAX_LOCK_TTL_SECS),
            generation_limit: positive_or("FAMTREE_GENERATION_LIMIT", DEFAULT_GENERATION_LIMIT),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
            public_url: var("FAMTREE_PUBLIC_URL"),
        })
    }
}
