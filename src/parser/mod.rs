//! The two script syntaxes and file-based loading.
//!
//! Both grammars produce the same canonical [`Script`]; nothing else is shared
//! between them.

pub mod lines;
pub mod structured;

use std::fmt;
use std::path::Path;

use crate::error::ScriptError;
use crate::record::Script;

/// A structured-syntax entry that could not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the source `commands` list.
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error loading command {}: {}", self.index, self.reason)
    }
}

/// Canonical script plus any entries dropped while reading it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedScript {
    pub script: Script,
    pub rejected: Vec<RejectedRecord>,
}

impl From<Script> for ParsedScript {
    fn from(script: Script) -> Self {
        Self {
            script,
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Structured,
    Lines,
}

impl Syntax {
    /// `.json` files use the structured syntax, anything else the line syntax.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Structured,
            _ => Self::Lines,
        }
    }
}

pub fn parse_str(text: &str, syntax: Syntax) -> Result<ParsedScript, ScriptError> {
    match syntax {
        Syntax::Structured => structured::parse_str(text),
        Syntax::Lines => lines::parse(text).map(ParsedScript::from),
    }
}

pub fn load_file(path: impl AsRef<Path>) -> Result<ParsedScript, ScriptError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ScriptError::NotFound(path.to_path_buf())
        } else {
            ScriptError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_str(&text, Syntax::for_path(path))
}
