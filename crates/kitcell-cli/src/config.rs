//! Configuration vault – reads `~/.kitcell/config.toml` with `KITCELL_*`
//! environment overrides layered on top.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use kitcell_engine::FulfillmentConfig;
use serde::{Deserialize, Serialize};

/// Persisted controller configuration stored in `~/.kitcell/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sensor scan priority for matching; earlier sensors win ties.
    #[serde(default = "default_sensor_priority")]
    pub sensor_priority: Vec<String>,

    /// Maximum dispatch attempts per requirement.
    #[serde(default = "default_retry_limit")]
    pub match_retry_limit: u32,

    /// Pause between re-matching passes (milliseconds).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound on one actuation directive (milliseconds).
    #[serde(default = "default_actuation_timeout_ms")]
    pub actuation_timeout_ms: u64,

    /// Where to persist the fulfillment journal; `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<String>,
}

fn default_sensor_priority() -> Vec<String> {
    vec!["camera_bins0".to_string(), "camera_bins1".to_string()]
}
fn default_retry_limit() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    250
}
fn default_actuation_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor_priority: default_sensor_priority(),
            match_retry_limit: default_retry_limit(),
            retry_delay_ms: default_retry_delay_ms(),
            actuation_timeout_ms: default_actuation_timeout_ms(),
            journal_path: None,
        }
    }
}

impl Config {
    /// Translate into the engine's tunable bundle.
    pub fn fulfillment_config(&self) -> FulfillmentConfig {
        FulfillmentConfig {
            sensor_priority: self.sensor_priority.clone(),
            match_retry_limit: self.match_retry_limit,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            actuation_timeout: Duration::from_millis(self.actuation_timeout_ms),
        }
    }
}

/// Return the path to `~/.kitcell/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kitcell").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
/// Environment overrides are applied either way by the caller via
/// [`apply_env_overrides`].
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `KITCELL_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `KITCELL_SENSORS` | `sensor_priority` (comma-separated) |
/// | `KITCELL_RETRY_LIMIT` | `match_retry_limit` |
/// | `KITCELL_RETRY_DELAY_MS` | `retry_delay_ms` |
/// | `KITCELL_ACTUATION_TIMEOUT_MS` | `actuation_timeout_ms` |
/// | `KITCELL_JOURNAL_PATH` | `journal_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("KITCELL_SENSORS") {
        let sensors: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !sensors.is_empty() {
            cfg.sensor_priority = sensors;
        }
    }
    if let Ok(v) = std::env::var("KITCELL_RETRY_LIMIT")
        && let Ok(limit) = v.parse::<u32>()
    {
        cfg.match_retry_limit = limit;
    }
    if let Ok(v) = std::env::var("KITCELL_RETRY_DELAY_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.retry_delay_ms = ms;
    }
    if let Ok(v) = std::env::var("KITCELL_ACTUATION_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.actuation_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("KITCELL_JOURNAL_PATH") {
        cfg.journal_path = Some(v);
    }
}
