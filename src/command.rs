//! The command interface every script action implements.

use std::fmt;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::record::Record;

/// One script action.
///
/// Commands hold only plain parameters. Collaborators arrive through the
/// [`ExecutionContext`] at execution time and must not be kept past the call.
/// A command is immutable once built; `to_record` followed by the registry
/// factory for `kind()` yields an equivalent command.
pub trait Command: Send + Sync + fmt::Debug {
    fn kind(&self) -> &str;

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError>;

    fn to_record(&self) -> Record;

    /// Human-readable form used in logs and error reports.
    fn describe(&self) -> String {
        let record = self.to_record();
        format!("{}({})", record.kind, Value::Object(record.params))
    }
}
