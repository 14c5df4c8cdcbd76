//! Script engine for driving a browser surface: a small command set
//! (navigate, pause, save markup, save text), two script syntaxes, and a
//! sequential executor with pause/resume/stop.

pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod parser;
pub mod record;
pub mod registry;
pub mod settings;
pub mod surface;

pub use command::Command;
pub use config::EngineConfig;
pub use context::{ExecutionContext, LogEntry, LogLevel, WaitPolicy};
pub use error::{
    ConfigError, ExecutionError, LoadTimeout, RegistryError, ScriptError, ValidationError,
};
pub use executor::{ExecutorControl, Progress, RunError, ScriptExecutor};
pub use parser::{ParsedScript, RejectedRecord, Syntax};
pub use record::{Record, SCRIPT_VERSION, Script};
pub use registry::Registry;
pub use settings::{JsonSettings, Settings, SettingsError};
pub use surface::{AutomationSurface, MemoryPage, MemorySurface, Page, SurfaceError};
