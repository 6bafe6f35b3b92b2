//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FolioSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use folio_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::FolioSettings;

/// Resolve the settings file path.
///
/// `FOLIO_SETTINGS_PATH` wins; otherwise `~/.folio/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = read_env_string("FOLIO_SETTINGS_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".folio").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FolioSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FolioSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<FolioSettings> {
    let defaults = serde_json::to_value(FolioSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides(settings: &mut FolioSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`. Split out so tests can supply a
/// map instead of mutating the process environment.
pub(crate) fn apply_overrides(settings: &mut FolioSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Browser ─────────────────────────────────────────────────────
    if let Some(v) = string("CHROME_PATH") {
        settings.browser.chrome_path = Some(v);
    }
    if let Some(ms) = parsed(&lookup, "FOLIO_BROWSER_LAUNCH_TIMEOUT_MS", |v| parse_u64_range(v, 100, 600_000)) {
        settings.browser.launch_timeout_ms = ms;
    }
    if let Some(b) = parsed(&lookup, "FOLIO_BROWSER_DUMPIO", parse_bool) {
        settings.browser.dumpio = b;
    }

    // ── AWS ─────────────────────────────────────────────────────────
    if let Some(v) = string("FOLIO_AWS_ENDPOINT_URL") {
        settings.aws.endpoint_url = Some(v);
    }
    if let Some(b) = parsed(&lookup, "FOLIO_USE_REQUEST_CREDENTIALS", parse_bool) {
        settings.aws.use_request_credentials = b;
    }
    if let Some(v) = string("ALERT_NOTIFICATIONS_SNS_ARN") {
        settings.aws.alert_topic_arn = Some(v);
    }

    // ── Invocation ──────────────────────────────────────────────────
    if let Some(v) = string("AWS_LAMBDA_FUNCTION_NAME") {
        settings.invocation.function_name = v;
    }
    if let Some(v) = string("AWS_LAMBDA_LOG_GROUP_NAME") {
        settings.invocation.log_group_name = Some(v);
    }
    if let Some(v) = string("AWS_LAMBDA_LOG_STREAM_NAME") {
        settings.invocation.log_stream_name = Some(v);
    }
    if let Some(ms) = parsed(&lookup, "FOLIO_TIME_BUDGET_MS", |v| parse_u64_range(v, 1_000, 3_600_000)) {
        settings.invocation.time_budget_ms = ms;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("FOLIO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(f) = parsed(&lookup, "FOLIO_LOG_FORMAT", LogFormat::parse) {
        settings.logging.format = f;
    }

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("FOLIO_HOST") {
        settings.server.host = v;
    }
    if let Some(port) = parsed(&lookup, "FOLIO_PORT", |v| parse_u16_range(v, 1, 65535)) {
        settings.server.port = port;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(name).filter(|v| !v.is_empty())?;
    let value = parse(&raw);
    if value.is_none() {
        tracing::warn!(key = name, value = %raw, "invalid env var, ignoring");
    }
    value
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
