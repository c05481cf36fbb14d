//! Connection pool settings.

use std::{env, time::Duration};

/// Settings for the Postgres pool the ledger runs on.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Pool size bounds
    pub max_connections: u32,
    pub min_connections: u32,

    /// How long to wait for a connection before giving up
    pub acquire_timeout: Duration,

    /// Idle and total lifetime limits per connection
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// Build settings from the environment.
    ///
    /// `DATABASE_URL` is required. `DB_MAX_CONNECTIONS`,
    /// `DB_MIN_CONNECTIONS`, `DB_CONNECTION_TIMEOUT`, `DB_IDLE_TIMEOUT`
    /// and `DB_MAX_LIFETIME` override the defaults when set; malformed
    /// values fall back to the default rather than aborting startup.
    pub fn from_env() -> Result<Self, env::VarError> {
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                env::var(key)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        };
        let size = |key: &str, default: u32| {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Ok(Self {
            url: env::var("DATABASE_URL")?,
            max_connections: size("DB_MAX_CONNECTIONS", 20),
            min_connections: size("DB_MIN_CONNECTIONS", 5),
            acquire_timeout: secs("DB_CONNECTION_TIMEOUT", 10),
            idle_timeout: secs("DB_IDLE_TIMEOUT", 600),
            max_lifetime: secs("DB_MAX_LIFETIME", 1800),
        })
    }

    /// Local development defaults against `frog_db`.
    pub fn development() -> Self {
        Self {
            url: "postgres://postgres@localhost/frog_db".to_string(),
            max_connections: 20,
            min_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
