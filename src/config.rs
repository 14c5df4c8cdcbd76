use std::path::PathBuf;
use std::time::Duration;

use crate::context::WaitPolicy;
use crate::error::ConfigError;
use crate::settings::JsonSettings;

/// Engine configuration loaded from environment variables.
///
/// Every field has a default suitable for interactive runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub wait: WaitPolicy,
    /// Halt the run at the first failing command (default: `false`).
    pub stop_on_error: bool,
    /// Settings file; `None` when no config directory can be determined.
    pub settings_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            stop_on_error: false,
            settings_path: JsonSettings::default_path(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default                              |
    /// |------------------------|--------------------------------------|
    /// | `QWS_LOAD_TIMEOUT_MS`  | `30000`                              |
    /// | `QWS_POLL_INTERVAL_MS` | `50`                                 |
    /// | `QWS_SETTLE_MS`        | `1000`                               |
    /// | `QWS_PAUSE_POLL_MS`    | `100`                                |
    /// | `QWS_DRAIN_EVENTS`     | `true`                               |
    /// | `QWS_STOP_ON_ERROR`    | `false`                              |
    /// | `QWS_SETTINGS`         | `<config dir>/qwsengine/settings.json` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let wait = WaitPolicy {
            load_timeout: millis(var("QWS_LOAD_TIMEOUT_MS"), "QWS_LOAD_TIMEOUT_MS")?
                .unwrap_or(defaults.wait.load_timeout),
            poll_interval: millis(var("QWS_POLL_INTERVAL_MS"), "QWS_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.wait.poll_interval),
            settle_delay: millis(var("QWS_SETTLE_MS"), "QWS_SETTLE_MS")?
                .unwrap_or(defaults.wait.settle_delay),
            pause_poll_interval: millis(var("QWS_PAUSE_POLL_MS"), "QWS_PAUSE_POLL_MS")?
                .unwrap_or(defaults.wait.pause_poll_interval),
            drain_events: flag(var("QWS_DRAIN_EVENTS"), "QWS_DRAIN_EVENTS")?
                .unwrap_or(defaults.wait.drain_events),
        };
        if wait.poll_interval.is_zero() {
            return Err(ConfigError {
                key: "QWS_POLL_INTERVAL_MS".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            wait,
            stop_on_error: flag(var("QWS_STOP_ON_ERROR"), "QWS_STOP_ON_ERROR")?
                .unwrap_or(defaults.stop_on_error),
            settings_path: var("QWS_SETTINGS")
                .map(PathBuf::from)
                .or(defaults.settings_path),
        })
    }
}

fn millis(raw: Option<String>, key: &str) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            })
    })
    .transpose()
}

fn flag(raw: Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    raw.map(|value| match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key: key.to_string(),
            value,
            reason: "expected true or false".into(),
        }),
    })
    .transpose()
}
