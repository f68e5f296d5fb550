use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

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
/// Decoupled from the process environment so tests can drive it with a
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("WFPOP_ENV", "development"))?;

    let bind_addr = or_default("WFPOP_BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("WFPOP_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("WFPOP_LOG_LEVEL", "info");
    let keywords_path = PathBuf::from(or_default(
        "WFPOP_KEYWORDS_PATH",
        "./data/seed_workflows.json",
    ));
    let regions = parse_regions(&or_default("WFPOP_REGIONS", "US,IN"))
        .map_err(|reason| invalid("WFPOP_REGIONS", reason))?;

    let youtube_api_key = lookup("YOUTUBE_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let forum_base_url = or_default("WFPOP_FORUM_BASE_URL", "https://community.n8n.io")
        .trim_end_matches('/')
        .to_string();

    let db_max_connections = parse_u32("WFPOP_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("WFPOP_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("WFPOP_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("WFPOP_HTTP_TIMEOUT_SECS", "10")?;
    let http_user_agent = or_default("WFPOP_HTTP_USER_AGENT", "n8n-popularity-harvester/1.0");
    let http_max_retries = parse_u32("WFPOP_HTTP_MAX_RETRIES", "2")?;
    let http_retry_backoff_base_ms = parse_u64("WFPOP_HTTP_RETRY_BACKOFF_BASE_MS", "500")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        keywords_path,
        regions,
        youtube_api_key,
        forum_base_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_user_agent,
        http_max_retries,
        http_retry_backoff_base_ms,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WFPOP_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Split a comma-separated region list, upper-casing and deduplicating.
fn parse_regions(raw: &str) -> Result<Vec<String>, String> {
    let mut regions: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let code = part.trim().to_ascii_uppercase();
        if code.is_empty() || regions.contains(&code) {
            continue;
        }
        if !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("region code '{code}' must be alphabetic"));
        }
        regions.push(code);
    }

    if regions.is_empty() {
        return Err("at least one region code is required".to_string());
    }
    Ok(regions)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
