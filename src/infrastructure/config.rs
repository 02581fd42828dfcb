use crate::domain::status_display::ThemeTokens;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:4000/api/";
const BASE_URL_KEYS: [&str; 2] = ["BOOKING_API_BASE_URL", "API_BASE_URL"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadRetryConfig {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timezone: Tz,
    pub profile_sync_interval_seconds: u64,
    pub countdown_tick_millis: u64,
    pub read_retry: ReadRetryConfig,
    pub theme: ThemeTokens,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppConfigFile {
    api_base_url: Option<String>,
    timezone: Option<String>,
    profile_sync_interval_seconds: Option<u64>,
    countdown_tick_millis: Option<u64>,
    #[serde(default)]
    read_retry: ReadRetryConfig,
    #[serde(default)]
    theme: ThemeTokens,
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "apiBaseUrl": DEFAULT_API_BASE_URL,
        "timezone": "UTC",
        "profileSyncIntervalSeconds": 60,
        "countdownTickMillis": 1000,
        "readRetry": {
            "maxAttempts": 3,
            "baseDelayMs": 200
        },
        "theme": ThemeTokens::default()
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_client_config(config_dir: &Path) -> Result<ClientConfig, InfraError> {
    load_client_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_client_config_with_lookup<F>(config_dir: &Path, lookup: F) -> Result<ClientConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_dir.join(APP_JSON);
    let file: AppConfigFile = serde_json::from_value(read_config(&path)?)?;

    let api_base_url = optional_lookup_value(&lookup, &BASE_URL_KEYS)
        .or_else(|| non_empty(file.api_base_url))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let timezone = match non_empty(file.timezone) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{name}': {error}")))?,
        None => chrono_tz::UTC,
    };

    let profile_sync_interval_seconds = file.profile_sync_interval_seconds.unwrap_or(60);
    if profile_sync_interval_seconds == 0 {
        return Err(InfraError::InvalidConfig(
            "profileSyncIntervalSeconds must be > 0".to_string(),
        ));
    }
    let countdown_tick_millis = file.countdown_tick_millis.unwrap_or(1000);
    if countdown_tick_millis == 0 {
        return Err(InfraError::InvalidConfig(
            "countdownTickMillis must be > 0".to_string(),
        ));
    }

    Ok(ClientConfig {
        api_base_url,
        timezone,
        profile_sync_interval_seconds,
        countdown_tick_millis,
        read_retry: file.read_retry,
        theme: file.theme,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
