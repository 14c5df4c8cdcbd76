//! Structured syntax: `{"version": "1.0", "commands": [{"command": kind, ...}]}`.
//!
//! Malformed entries are rejected one by one; the rest of the script stays
//! loadable.

use serde_json::Value;

use crate::error::ScriptError;
use crate::record::{Record, SCRIPT_VERSION, Script};

use super::{ParsedScript, RejectedRecord};

pub fn parse_str(text: &str) -> Result<ParsedScript, ScriptError> {
    let value: Value = serde_json::from_str(text)?;
    parse_value(&value)
}

pub fn parse_value(value: &Value) -> Result<ParsedScript, ScriptError> {
    let document = value.as_object().ok_or(ScriptError::NotAnObject)?;
    let entries = document
        .get("commands")
        .ok_or(ScriptError::MissingCommands)?
        .as_array()
        .ok_or(ScriptError::CommandsNotAList)?;

    let version = document
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(SCRIPT_VERSION)
        .to_string();

    let mut commands = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match to_record(entry) {
            Ok(record) => commands.push(record),
            Err(reason) => rejected.push(RejectedRecord { index, reason }),
        }
    }

    Ok(ParsedScript {
        script: Script { version, commands },
        rejected,
    })
}

fn to_record(entry: &Value) -> Result<Record, String> {
    let fields = entry
        .as_object()
        .ok_or_else(|| format!("expected an object, got: {entry}"))?;
    let kind = match fields.get("command") {
        Some(Value::String(kind)) if !kind.is_empty() => kind.clone(),
        Some(other) if !other.is_null() => {
            return Err(format!("'command' must be a non-empty string, got: {other}"));
        }
        _ => return Err("missing 'command' key".to_string()),
    };

    let mut params = fields.clone();
    params.remove("command");
    Ok(Record { kind, params })
}
