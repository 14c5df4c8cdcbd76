//! Configuration capability consumed by commands (`save_folder` lookup).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait Settings: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Value>;

    fn get(&self, key: &str, default: Value) -> Value {
        self.lookup(key).unwrap_or(default)
    }

    /// String setting; non-string or empty values fall back to `default`.
    fn get_str(&self, key: &str, default: &str) -> String {
        match self.lookup(key) {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }
}

impl Settings for Map<String, Value> {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

/// Read-only settings store backed by a JSON object on disk.
#[derive(Debug, Clone, Default)]
pub struct JsonSettings {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl JsonSettings {
    /// Load `path`. A missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self {
                    path: Some(path),
                    values: Map::new(),
                });
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        let values = serde_json::from_str::<Map<String, Value>>(&text)
            .map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path: Some(path),
            values,
        })
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { path: None, values }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `<config dir>/qwsengine/settings.json`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qwsengine").join(SETTINGS_FILE))
    }
}

impl Settings for JsonSettings {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}
