//! Error taxonomy for script loading, command construction and execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::surface::SurfaceError;

/// A record carried a missing or malformed parameter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("'{0}' parameter is required")]
    Missing(String),

    #[error("'{param}' must be {expected}, got: {found}")]
    WrongType {
        param: String,
        expected: &'static str,
        found: String,
    },

    #[error("'{param}' {reason}")]
    OutOfRange { param: String, reason: String },
}

impl ValidationError {
    pub fn missing(param: impl Into<String>) -> Self {
        Self::Missing(param.into())
    }

    pub fn wrong_type(param: impl Into<String>, expected: &'static str, found: impl ToString) -> Self {
        Self::WrongType {
            param: param.into(),
            expected,
            found: found.to_string(),
        }
    }

    pub fn out_of_range(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("command already registered: {0}")]
    Duplicate(String),

    #[error("unknown command: {name}; available commands: {}", .available.join(", "))]
    UnknownCommand {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid '{kind}' command: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: ValidationError,
    },
}

/// A command could not complete its runtime action.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no browser window available")]
    NoSurface,

    #[error("no active page available")]
    NoPage,

    #[error("failed to load URL {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: SurfaceError,
    },

    #[error("failed to extract page {what}: {source}")]
    Extraction {
        what: &'static str,
        #[source]
        source: SurfaceError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The surface never signalled load completion. Logged as a warning, never fatal.
#[derive(Debug, Clone, Error)]
#[error("page load timeout after {}ms for {url}", .waited.as_millis())]
pub struct LoadTimeout {
    pub url: String,
    pub waited: Duration,
}

/// Whole-script failures raised while reading or parsing a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("script must be a JSON object")]
    NotAnObject,

    #[error("JSON must contain 'commands' key")]
    MissingCommands,

    #[error("'commands' must be a list")]
    CommandsNotAList,

    /// Every line-level failure of a line-syntax script, in line order.
    #[error("{}", .0.join("\n"))]
    Syntax(Vec<String>),
}

/// An environment variable held a value the engine cannot use.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value for {key}: {value:?} ({reason})")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}
