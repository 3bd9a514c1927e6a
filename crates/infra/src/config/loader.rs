//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Load `.env` from the working directory if present (`dotenvy`)
//! 2. Attempt to load from environment variables
//! 3. If `HUBWIRE_BASE_URL` is missing, fall back to loading from file
//! 4. Search multiple paths for config files (JSON or TOML)
//!
//! ## Environment Variables
//! - `HUBWIRE_BASE_URL`: API root (required)
//! - `HUBWIRE_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `HUBWIRE_RETRIES`: Retries after the first attempt
//! - `HUBWIRE_RETRY_DELAY_MS`: Base backoff delay in milliseconds
//! - `HUBWIRE_RATE_LIMIT_MAX`: Requests per rate window
//! - `HUBWIRE_RATE_LIMIT_WINDOW_MS`: Rate window in milliseconds
//! - `HUBWIRE_CACHE_ENABLED`: Whether GET responses are cached (true/false)
//! - `HUBWIRE_CACHE_TTL`: Cache TTL in seconds
//! - `HUBWIRE_CACHE_MAX_SIZE`: Maximum cached responses
//! - `HUBWIRE_CACHE_STRATEGY`: `lru` or `fifo`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./hubwire.json` or `./hubwire.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../hubwire.json` or `../hubwire.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hubwire_domain::{ApiError, ApiResult, CacheStrategy, ClientConfig};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the base URL is
/// not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `CONFIGURATION_ERROR` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> ApiResult<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `HUBWIRE_BASE_URL` is required; every other variable overrides the
/// matching default.
///
/// # Errors
/// Returns `CONFIGURATION_ERROR` if the base URL is missing or a variable
/// has an invalid value.
pub fn load_from_env() -> ApiResult<ClientConfig> {
    let mut config = ClientConfig::new(env_var("HUBWIRE_BASE_URL")?);

    if let Some(timeout) = env_parse::<u64>("HUBWIRE_TIMEOUT_MS")? {
        config.timeout_ms = timeout;
    }
    if let Some(retries) = env_parse::<u32>("HUBWIRE_RETRIES")? {
        config.retries = retries;
    }
    if let Some(delay) = env_parse::<u64>("HUBWIRE_RETRY_DELAY_MS")? {
        config.retry_delay_ms = delay;
    }
    if let Some(max) = env_parse::<u32>("HUBWIRE_RATE_LIMIT_MAX")? {
        config.rate_limit.max_requests = max;
    }
    if let Some(window) = env_parse::<u64>("HUBWIRE_RATE_LIMIT_WINDOW_MS")? {
        config.rate_limit.window_ms = window;
    }
    config.cache.enabled = env_bool("HUBWIRE_CACHE_ENABLED", config.cache.enabled);
    if let Some(ttl) = env_parse::<u64>("HUBWIRE_CACHE_TTL")? {
        config.cache.ttl = ttl;
    }
    if let Some(max_size) = env_parse::<usize>("HUBWIRE_CACHE_MAX_SIZE")? {
        config.cache.max_size = max_size;
    }
    if let Some(strategy) = env_parse::<CacheStrategy>("HUBWIRE_CACHE_STRATEGY")? {
        config.cache.strategy = strategy;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CONFIGURATION_ERROR` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> ApiResult<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ApiError::configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            ApiError::configuration("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ApiError::configuration(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> ApiResult<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ApiError::configuration(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ApiError::configuration(format!("Invalid JSON format: {e}"))),
        _ => Err(ApiError::configuration(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the known locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["hubwire.json", "hubwire.toml", "config.json", "config.toml"];
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
        candidates.extend(NAMES[..2].iter().map(|name| cwd.join("..").join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> ApiResult<String> {
    std::env::var(key)
        .map_err(|_| ApiError::configuration(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> ApiResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ApiError::configuration(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
