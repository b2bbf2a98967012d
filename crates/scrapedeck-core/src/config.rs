use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but holds an invalid value.
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
/// Returns `ConfigError` if a variable is present but holds an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let bind_addr = parse_addr("SCRAPEDECK_BIND_ADDR", "127.0.0.1:5001")?;
    let log_level = or_default("SCRAPEDECK_LOG_LEVEL", "info");
    let sites_path = lookup("SCRAPEDECK_SITES_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let output_dir = PathBuf::from(or_default("SCRAPEDECK_OUTPUT_DIR", "./output"));
    let save_results = parse_bool("SCRAPEDECK_SAVE_RESULTS", "false")?;
    let request_timeout_secs = parse_u64("SCRAPEDECK_REQUEST_TIMEOUT_SECS", "20")?;

    let max_attempts = parse_u32("SCRAPEDECK_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(invalid(
            "SCRAPEDECK_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }

    let delay_scale = or_default("SCRAPEDECK_DELAY_SCALE", "1.0")
        .parse::<f64>()
        .map_err(|e| invalid("SCRAPEDECK_DELAY_SCALE", e.to_string()))?;
    if !delay_scale.is_finite() || delay_scale < 0.0 {
        return Err(invalid(
            "SCRAPEDECK_DELAY_SCALE",
            format!("must be a finite, non-negative number, got {delay_scale}"),
        ));
    }

    let rate_limit_per_minute = parse_usize("SCRAPEDECK_RATE_LIMIT_PER_MINUTE", "30")?;

    Ok(AppConfig {
        bind_addr,
        log_level,
        sites_path,
        output_dir,
        save_results,
        request_timeout_secs,
        max_attempts,
        delay_scale,
        rate_limit_per_minute,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
