use std::time::Duration;

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, ValidationError};
use crate::record::Record;

use super::PAUSE;

/// Suspend the run for a fixed number of seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Pause {
    seconds: f64,
}

impl Pause {
    pub fn new(seconds: f64) -> Result<Self, ValidationError> {
        if !seconds.is_finite() {
            return Err(ValidationError::wrong_type("seconds", "a number", seconds));
        }
        if seconds < 0.0 {
            return Err(ValidationError::out_of_range("seconds", "must be non-negative"));
        }
        if Duration::try_from_secs_f64(seconds).is_err() {
            return Err(ValidationError::out_of_range("seconds", "is too large"));
        }
        Ok(Self { seconds })
    }

    pub fn from_record(record: &Record) -> Result<Self, ValidationError> {
        let seconds = record
            .number_param("seconds")?
            .ok_or_else(|| ValidationError::missing("seconds"))?;
        Self::new(seconds)
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

impl Command for Pause {
    fn kind(&self) -> &str {
        PAUSE
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        if self.seconds > 0.0 {
            ctx.log(format!("Pausing for {} seconds...", self.seconds));
            ctx.idle_for(Duration::from_secs_f64(self.seconds));
            ctx.log("Pause complete");
        } else {
            ctx.log("Pause duration is 0 seconds");
        }
        Ok(())
    }

    fn to_record(&self) -> Record {
        Record::new(PAUSE).with("seconds", self.seconds)
    }
}
