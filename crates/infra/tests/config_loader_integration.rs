//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading `ClientConfig` from files.

use std::io::Write;
use std::path::PathBuf;

use hubwire_domain::{CacheStrategy, ErrorCode};
use hubwire_infra::config;
use tempfile::NamedTempFile;

/// Write `contents` to a temp file and copy it under `extension`
fn config_file(contents: &str, extension: &str) -> PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let path = config_file(
        r#"{
            "baseURL": "https://api.example.com/v1",
            "timeout": 5000,
            "retries": 2,
            "retryDelay": 250,
            "headers": { "Accept-Language": "pl" },
            "rateLimit": { "maxRequests": 3, "windowMs": 1000 },
            "burstRateLimit": { "maxBurst": 2, "burstWindowMs": 100 },
            "cache": { "ttl": 2, "maxSize": 10, "strategy": "fifo" }
        }"#,
        "json",
    );

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_ok(), "Failed to load config from JSON file: {result:?}");

    let config = result.unwrap();

    // Verify transport settings
    assert_eq!(config.base_url, "https://api.example.com/v1");
    assert_eq!(config.timeout_ms, 5000);
    assert_eq!(config.retries, 2);
    assert_eq!(config.retry_delay_ms, 250);
    assert_eq!(config.headers.get("Accept-Language").map(String::as_str), Some("pl"));

    // Verify rate limit settings
    assert_eq!(config.rate_limit.max_requests, 3);
    assert_eq!(config.rate_limit.window_ms, 1000);
    let burst = config.burst_rate_limit.expect("burst settings");
    assert_eq!(burst.max_burst, 2);
    assert_eq!(burst.burst_window_ms, 100);

    // Verify cache settings
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl, 2);
    assert_eq!(config.cache.max_size, 10);
    assert_eq!(config.cache.strategy, CacheStrategy::Fifo);
    assert!(config.l2_cache.is_none());

    // Cleanup
    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let path = config_file(
        r#"
baseURL = "https://api.example.com"
retries = 0

[rateLimit]
maxRequests = 50
windowMs = 60000

[cache]
enabled = false

[l2Cache]
ttl = 3600
maxSize = 5000
"#,
        "toml",
    );

    let config = config::load_from_file(Some(path.clone())).expect("TOML config should load");

    assert_eq!(config.base_url, "https://api.example.com");
    assert_eq!(config.retries, 0);
    assert_eq!(config.rate_limit.max_requests, 50);
    assert!(!config.cache.enabled);
    let l2 = config.l2_cache.expect("l2 cache settings");
    assert_eq!(l2.ttl, 3600);
    assert_eq!(l2.max_size, 5000);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_file_not_found() {
    let path = PathBuf::from("/nonexistent/path/hubwire.json");
    let err = config::load_from_file(Some(path)).unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigurationError);
    assert!(err.message.contains("not found"));
}

#[test]
fn test_load_config_invalid_json() {
    let path = config_file("{ invalid json }", "json");

    let err = config::load_from_file(Some(path.clone())).unwrap_err();
    assert!(err.message.contains("Invalid JSON"));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_rejects_invalid_base_url() {
    let path = config_file(r#"{ "baseURL": "ftp://files.example.com" }"#, "json");

    let err = config::load_from_file(Some(path.clone())).unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigurationError);
    assert!(err.message.contains("baseURL"));

    std::fs::remove_file(path).ok();
}
