use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub const SCRIPT_VERSION: &str = "1.0";

/// Canonical name + parameter form every script syntax reduces to.
///
/// Serializes flat, the way scripts are stored on disk:
/// `{"command": "navigate", "url": "https://...", "wait_for_load": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "command")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Record {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parameter lookup. An explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    pub fn str_param(&self, key: &str) -> Result<Option<&str>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ValidationError::wrong_type(key, "a string", other)),
        }
    }

    pub fn bool_param(&self, key: &str) -> Result<Option<bool>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(ValidationError::wrong_type(key, "a boolean", other)),
        }
    }

    /// Numeric parameter; numeric strings such as `"2.5"` are accepted too.
    pub fn number_param(&self, key: &str) -> Result<Option<f64>, ValidationError> {
        let number = match self.get(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(ValidationError::wrong_type(
                key,
                "a number",
                self.params.get(key).unwrap_or(&Value::Null),
            )),
        }
    }
}

fn default_version() -> String {
    SCRIPT_VERSION.to_string()
}

/// An ordered list of canonical records. Order is the execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_version")]
    pub version: String,
    pub commands: Vec<Record>,
}

impl Script {
    pub fn new(commands: Vec<Record>) -> Self {
        Self {
            version: default_version(),
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_flat() {
        let record = Record::new("navigate")
            .with("url", "https://a.example")
            .with("wait_for_load", false);

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"command": "navigate", "url": "https://a.example", "wait_for_load": false})
        );

        let back: Record = serde_json::from_value(
            json!({"command": "pause", "seconds": 1.5}),
        )
        .unwrap();
        assert_eq!(back.kind, "pause");
        assert_eq!(back.number_param("seconds").unwrap(), Some(1.5));
        assert!(!back.params.contains_key("command"));
    }

    #[test]
    fn null_params_are_absent() {
        let record = Record::new("save_text").with("tag", Value::Null);
        assert_eq!(record.str_param("tag").unwrap(), None);
    }

    #[test]
    fn typed_accessors_reject_wrong_types() {
        let record = Record::new("x")
            .with("flag", "yes")
            .with("seconds", "soon")
            .with("name", 3);

        assert!(record.bool_param("flag").is_err());
        assert!(record.number_param("seconds").is_err());
        assert!(record.str_param("name").is_err());
        assert_eq!(
            Record::new("x").with("n", " 4 ").number_param("n").unwrap(),
            Some(4.0)
        );
    }

    #[test]
    fn script_version_defaults_when_absent() {
        let script: Script = serde_json::from_value(json!({"commands": []})).unwrap();
        assert_eq!(script.version, SCRIPT_VERSION);

        let script: Script =
            serde_json::from_value(json!({"version": "2.3", "commands": []})).unwrap();
        assert_eq!(script.version, "2.3");
    }
}
