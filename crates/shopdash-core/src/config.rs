use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Shopify rejects `limit` values above this on every REST list endpoint.
const MAX_SHOPIFY_PAGE_SIZE: u32 = 250;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SHOPDASH_ENV", "development"))?;

    let shopify_api_secret = optional("SHOPIFY_API_SECRET");
    if env == Environment::Production && shopify_api_secret.is_none() {
        return Err(ConfigError::MissingEnvVar("SHOPIFY_API_SECRET".to_string()));
    }

    let bind_addr = parse_addr("SHOPDASH_BIND_ADDR", "0.0.0.0:5000")?;
    let log_level = or_default("SHOPDASH_LOG_LEVEL", "info");
    let api_token_salt = optional("SHOPDASH_API_TOKEN_SALT");
    let shopify_api_version = or_default("SHOPIFY_API_VERSION", "2024-10");

    let db_max_connections = parse_u32("SHOPDASH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPDASH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPDASH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let shopify_request_timeout_secs = parse_u64("SHOPDASH_SHOPIFY_REQUEST_TIMEOUT_SECS", "30")?;
    let shopify_user_agent = or_default("SHOPDASH_SHOPIFY_USER_AGENT", "shopdash/0.1 (analytics)");
    let shopify_page_size =
        parse_u32("SHOPDASH_SHOPIFY_PAGE_SIZE", "250")?.clamp(1, MAX_SHOPIFY_PAGE_SIZE);
    let shopify_max_retries = parse_u32("SHOPDASH_SHOPIFY_MAX_RETRIES", "3")?;
    let shopify_retry_backoff_base_secs =
        parse_u64("SHOPDASH_SHOPIFY_RETRY_BACKOFF_BASE_SECS", "2")?;

    let dedupe_window_secs = parse_u64("SHOPDASH_DEDUPE_WINDOW_SECS", "60")?;
    let sync_cron = or_default("SHOPDASH_SYNC_CRON", "0 */15 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_token_salt,
        shopify_api_secret,
        shopify_api_version,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        shopify_request_timeout_secs,
        shopify_user_agent,
        shopify_page_size,
        shopify_max_retries,
        shopify_retry_backoff_base_secs,
        dedupe_window_secs,
        sync_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPDASH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
