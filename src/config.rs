//! Service configuration loaded from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `MONGODB_URI`
    pub mongodb_uri: String,

    /// Env: `DATABASE_NAME`
    pub database_name: String,

    /// HS256 signing secret for bearer tokens.
    /// Env: `JSON_WEB_TOKEN_SECRET` (required)
    pub token_secret: String,

    /// Lifetime of issued tokens. `None` means tokens live until sign-out.
    /// Env: `TOKEN_TTL_SECS`
    pub token_ttl_secs: Option<u64>,

    /// Env: `BCRYPT_COST`
    pub bcrypt_cost: u32,

    /// Env: `HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// Env: `WORKERS`
    pub workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_secret = lookup("JSON_WEB_TOKEN_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JSON_WEB_TOKEN_SECRET"))?;

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", 8)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let token_ttl_secs = match lookup("TOKEN_TTL_SECS") {
            Some(raw) => Some(parse("TOKEN_TTL_SECS", &raw)?),
            None => None,
        };

        Ok(Self {
            mongodb_uri: lookup("MONGODB_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "planner".to_string()),
            token_secret,
            token_ttl_secs,
            bcrypt_cost,
            http_addr: parse_or(&lookup, "HTTP_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            workers: parse_or(&lookup, "WORKERS", 4)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => {
            log::debug!("{} not set, using default", key);
            Ok(default)
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}
