//! Service configuration
//!
//! Read once at startup from the environment (after `.env` is loaded) and
//! handed to each component explicitly.

use std::time::Duration;

/// Environment variable for the database connection string
const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Environment variable for the execution API base host
const ENV_API_HOST: &str = "API_HOST";

/// Environment variable for the warehouse code placed on submissions
const ENV_WAREHOUSE: &str = "WAREHOUSE";

/// Environment variable for the pick status polling interval
const ENV_RECONCILE_INTERVAL: &str = "RECONCILE_INTERVAL_SECS";

/// Environment variable for the order submission interval
const ENV_SUBMIT_INTERVAL: &str = "ORDER_SUBMIT_INTERVAL_SECS";

/// Environment variable for the timeout sweep window
const ENV_TIMEOUT_DAYS: &str = "TIMEOUT_DAYS";

/// Environment variable for the per-call HTTP timeout
const ENV_API_TIMEOUT: &str = "API_TIMEOUT_SECS";

/// Environment variable for concurrent history fetches per batch
const ENV_RECONCILE_CONCURRENCY: &str = "RECONCILE_CONCURRENCY";

/// Environment variable for the admin API listen address
const ENV_BIND_ADDR: &str = "BIND_ADDR";

const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 10;
const DEFAULT_SUBMIT_INTERVAL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_DAYS: i64 = 1;
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECONCILE_CONCURRENCY: usize = 4;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    pub database_url: String,
    /// Base host of the execution API, without trailing slash
    pub api_host: String,
    pub warehouse: String,
    pub reconcile_interval: Duration,
    pub submit_interval: Duration,
    /// Age after which Processing lines are force-completed
    pub timeout_days: i64,
    /// Per-call timeout for execution API requests
    pub api_timeout: Duration,
    pub reconcile_concurrency: usize,
    pub bind_addr: String,
}

impl FulfillmentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required(ENV_DATABASE_URL)?;
        let api_host = required(ENV_API_HOST)?.trim_end_matches('/').to_string();
        let warehouse = required(ENV_WAREHOUSE)?;

        let reconcile_interval_secs: u64 =
            parse_or(&lookup, ENV_RECONCILE_INTERVAL, DEFAULT_RECONCILE_INTERVAL_SECS)?;
        let submit_interval_secs: u64 =
            parse_or(&lookup, ENV_SUBMIT_INTERVAL, DEFAULT_SUBMIT_INTERVAL_SECS)?;
        let timeout_days: i64 = parse_or(&lookup, ENV_TIMEOUT_DAYS, DEFAULT_TIMEOUT_DAYS)?;
        let api_timeout_secs: u64 = parse_or(&lookup, ENV_API_TIMEOUT, DEFAULT_API_TIMEOUT_SECS)?;
        let reconcile_concurrency: usize = parse_or(
            &lookup,
            ENV_RECONCILE_CONCURRENCY,
            DEFAULT_RECONCILE_CONCURRENCY,
        )?;

        if reconcile_interval_secs == 0 || submit_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: if reconcile_interval_secs == 0 {
                    ENV_RECONCILE_INTERVAL
                } else {
                    ENV_SUBMIT_INTERVAL
                },
                value: "0".to_string(),
            });
        }

        if timeout_days < 0 {
            return Err(ConfigError::Invalid {
                name: ENV_TIMEOUT_DAYS,
                value: timeout_days.to_string(),
            });
        }

        let bind_addr = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            database_url,
            api_host,
            warehouse,
            reconcile_interval: Duration::from_secs(reconcile_interval_secs),
            submit_interval: Duration::from_secs(submit_interval_secs),
            timeout_days,
            api_timeout: Duration::from_secs(api_timeout_secs),
            reconcile_concurrency: reconcile_concurrency.max(1),
            bind_addr,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
    }
}
