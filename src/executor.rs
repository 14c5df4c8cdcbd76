//! Sequential script execution with cooperative pause/resume/stop.
//!
//! One command runs at a time on the thread that called [`ScriptExecutor::execute`].
//! Controls only set flags; the loop observes them before each command, so
//! a command already in progress always runs to completion.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;
use serde_json::Value;

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::error::ScriptError;
use crate::parser::{self, ParsedScript};
use crate::record::{Record, Script};
use crate::registry::Registry;

/// A command that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub index: usize,
    pub command: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current_index: usize,
    pub total: usize,
    pub is_running: bool,
}

#[derive(Debug, Default)]
struct ControlState {
    running: AtomicBool,
    paused: AtomicBool,
    current: AtomicUsize,
    total: AtomicUsize,
}

/// Cloneable handle for steering a run from other threads.
#[derive(Debug, Clone, Default)]
pub struct ExecutorControl {
    state: Arc<ControlState>,
}

impl ExecutorControl {
    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
        tracing::info!("script paused");
    }

    pub fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
        tracing::info!("script resumed");
    }

    /// Request a stop; takes effect at the next checkpoint.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        tracing::info!("script stopped");
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_index: self.state.current.load(Ordering::SeqCst),
            total: self.state.total.load(Ordering::SeqCst),
            is_running: self.is_running(),
        }
    }
}

pub struct ScriptExecutor {
    registry: Arc<Registry>,
    context: ExecutionContext,
    commands: Vec<Box<dyn Command>>,
    load_errors: Vec<String>,
    errors: Vec<RunError>,
    control: ExecutorControl,
}

impl ScriptExecutor {
    pub fn new(registry: Arc<Registry>, context: ExecutionContext) -> Self {
        Self {
            registry,
            context,
            commands: Vec::new(),
            load_errors: Vec::new(),
            errors: Vec::new(),
            control: ExecutorControl::default(),
        }
    }

    /// Executor over the process-wide registry.
    pub fn with_global_registry(context: ExecutionContext) -> Self {
        Self::new(Registry::global(), context)
    }

    /// Replace the loaded commands. Records the registry cannot build are
    /// logged and skipped; the remaining commands stay runnable.
    pub fn load_records(&mut self, records: &[Record]) {
        self.commands.clear();
        self.load_errors.clear();
        self.errors.clear();
        self.control.state.current.store(0, Ordering::SeqCst);

        for (index, record) in records.iter().enumerate() {
            match self.registry.create_from(record) {
                Ok(command) => self.commands.push(command),
                Err(e) => {
                    let message = format!("Error loading command {index}: {e}");
                    self.context.error(message.clone());
                    self.load_errors.push(message);
                }
            }
        }
        self.control
            .state
            .total
            .store(self.commands.len(), Ordering::SeqCst);
    }

    pub fn load_script(&mut self, parsed: &ParsedScript) {
        self.load_records(&parsed.script.commands);
        for rejected in &parsed.rejected {
            let message = rejected.to_string();
            self.context.error(message.clone());
            self.load_errors.push(message);
        }
    }

    /// Load a structured-syntax document. Only a malformed document fails;
    /// bad entries end up in [`load_errors`](Self::load_errors).
    pub fn load_json(&mut self, value: &Value) -> Result<(), ScriptError> {
        let parsed = parser::structured::parse_value(value)?;
        self.load_script(&parsed);
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        let path = path.as_ref();
        let parsed = parser::load_file(path)?;
        self.load_script(&parsed);
        self.context
            .log(format!("Loaded script from: {}", path.display()));
        Ok(())
    }

    pub fn to_script(&self) -> Script {
        Script::new(self.commands.iter().map(|c| c.to_record()).collect())
    }

    /// Write the loaded commands as canonical JSON.
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        let path = path.as_ref();
        let json = self.to_script().to_json_pretty()?;
        std::fs::write(path, json).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.context.log(format!("Saved script to: {}", path.display()));
        Ok(())
    }

    pub fn execute(&mut self) -> bool {
        self.execute_with(|_, _, _| {})
    }

    /// Run every loaded command in order. `on_progress(index, total,
    /// description)` is called before each command and must return promptly.
    ///
    /// Returns `true` iff no command failed.
    pub fn execute_with<F>(&mut self, mut on_progress: F) -> bool
    where
        F: FnMut(usize, usize, &str),
    {
        let state = Arc::clone(&self.control.state);
        state.running.store(true, Ordering::SeqCst);
        self.errors.clear();

        let total = self.commands.len();
        state.total.store(total, Ordering::SeqCst);
        self.context
            .log(format!("Starting script execution ({total} commands)"));

        let mut succeeded = 0usize;
        for (index, command) in self.commands.iter().enumerate() {
            state.current.store(index, Ordering::SeqCst);

            if state.paused.load(Ordering::SeqCst) && state.running.load(Ordering::SeqCst) {
                self.context.log("Script paused");
                while state.paused.load(Ordering::SeqCst) && state.running.load(Ordering::SeqCst) {
                    self.context.drain_events();
                    std::thread::sleep(self.context.wait.pause_poll_interval);
                }
                if state.running.load(Ordering::SeqCst) {
                    self.context.log("Script resumed");
                }
            }

            if !state.running.load(Ordering::SeqCst) {
                self.context.log("Script execution stopped by user");
                break;
            }

            let description = command.describe();
            on_progress(index, total, &description);
            self.context
                .log(format!("Executing [{}/{total}]: {description}", index + 1));

            match command.execute(&mut self.context) {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    let message = e.to_string();
                    self.context.error(format!("Command failed: {message}"));
                    self.errors.push(RunError {
                        index,
                        command: description,
                        message,
                    });
                    if self.context.stop_on_error {
                        self.context.log("Stopping on error");
                        break;
                    }
                }
            }
        }

        state.running.store(false, Ordering::SeqCst);
        self.context.log(format!(
            "Script execution complete: {succeeded} succeeded, {} failed",
            self.errors.len()
        ));

        self.errors.is_empty()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn control(&self) -> ExecutorControl {
        self.control.clone()
    }

    pub fn progress(&self) -> Progress {
        self.control.progress()
    }

    /// Failures of the last run.
    pub fn errors(&self) -> Vec<RunError> {
        self.errors.clone()
    }

    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn into_context(self) -> ExecutionContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WaitPolicy;
    use crate::error::{ExecutionError, ValidationError};
    use std::sync::Mutex;

    /// Records its id when run; fails when asked to.
    #[derive(Debug)]
    struct Probe {
        id: usize,
        fail: bool,
        ran: Arc<Mutex<Vec<usize>>>,
    }

    impl Command for Probe {
        fn kind(&self) -> &str {
            "probe"
        }

        fn execute(&self, _ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
            self.ran.lock().unwrap().push(self.id);
            if self.fail {
                return Err(ExecutionError::NoPage);
            }
            Ok(())
        }

        fn to_record(&self) -> Record {
            Record::new("probe").with("id", self.id).with("fail", self.fail)
        }
    }

    fn probe_registry(ran: &Arc<Mutex<Vec<usize>>>) -> Arc<Registry> {
        let ran = Arc::clone(ran);
        let mut registry = Registry::with_builtins();
        registry
            .register("probe", move |r: &Record| {
                let id = r
                    .number_param("id")?
                    .ok_or_else(|| ValidationError::missing("id"))? as usize;
                let fail = r.bool_param("fail")?.unwrap_or(false);
                Ok(Box::new(Probe {
                    id,
                    fail,
                    ran: Arc::clone(&ran),
                }) as Box<dyn Command>)
            })
            .unwrap();
        Arc::new(registry)
    }

    fn probes(fail_at: Option<usize>) -> Vec<Record> {
        (0..3)
            .map(|id| {
                Record::new("probe")
                    .with("id", id)
                    .with("fail", Some(id) == fail_at)
            })
            .collect()
    }

    fn executor(ran: &Arc<Mutex<Vec<usize>>>, stop_on_error: bool) -> ScriptExecutor {
        let context = ExecutionContext::new()
            .with_wait_policy(WaitPolicy::immediate())
            .with_stop_on_error(stop_on_error);
        ScriptExecutor::new(probe_registry(ran), context)
    }

    #[test]
    fn failure_is_recorded_and_run_continues() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        exec.load_records(&probes(Some(1)));

        assert!(!exec.execute());
        assert_eq!(*ran.lock().unwrap(), vec![0, 1, 2]);

        let errors = exec.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);
        assert!(errors[0].command.starts_with("probe("));
        assert!(
            exec.context()
                .logs()
                .last()
                .unwrap()
                .ends_with("2 succeeded, 1 failed")
        );
    }

    #[test]
    fn stop_on_error_halts_the_run() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, true);
        exec.load_records(&probes(Some(1)));

        assert!(!exec.execute());
        assert_eq!(*ran.lock().unwrap(), vec![0, 1]);
        assert_eq!(exec.errors().len(), 1);
        assert!(!exec.progress().is_running);
    }

    #[test]
    fn clean_run_returns_true_and_resets_errors() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        exec.load_records(&probes(Some(0)));
        assert!(!exec.execute());

        exec.load_records(&probes(None));
        assert!(exec.errors().is_empty());
        assert!(exec.execute());
        assert_eq!(exec.progress(), Progress { current_index: 2, total: 3, is_running: false });
    }

    #[test]
    fn unbuildable_records_are_skipped_at_load() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        let mut records = probes(None);
        records.insert(1, Record::new("teleport"));
        records.push(Record::new("pause").with("seconds", -3));

        exec.load_records(&records);

        assert_eq!(exec.len(), 3);
        assert_eq!(exec.load_errors().len(), 2);
        assert!(exec.load_errors()[0].starts_with("Error loading command 1: unknown command: teleport"));
        assert!(exec.execute());
    }

    #[test]
    fn pause_then_resume_never_skips_or_repeats() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        exec.load_records(&probes(None));
        let control = exec.control();

        let mut seen = Vec::new();
        let ok = exec.execute_with(|index, total, _| {
            seen.push(index);
            assert_eq!(total, 3);
            if index == 1 {
                control.pause();
                let resumer = control.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(30));
                    resumer.resume();
                });
            }
        });

        assert!(ok);
        assert_eq!(seen, [0, 1, 2]);
        assert_eq!(*ran.lock().unwrap(), vec![0, 1, 2]);
        let logs = exec.context().logs();
        assert!(logs.iter().any(|l| l.ends_with("Script paused")));
        assert!(logs.iter().any(|l| l.ends_with("Script resumed")));
    }

    #[test]
    fn stop_takes_effect_at_next_checkpoint() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        exec.load_records(&probes(None));
        let control = exec.control();

        let ok = exec.execute_with(|index, _, _| {
            if index == 0 {
                control.stop();
            }
        });

        // Command 0 was already under way when stop arrived.
        assert!(ok);
        assert_eq!(*ran.lock().unwrap(), vec![0]);
        assert!(
            exec.context()
                .logs()
                .iter()
                .any(|l| l.ends_with("Script execution stopped by user"))
        );
    }

    #[test]
    fn stop_releases_a_paused_run() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut exec = executor(&ran, false);
        exec.load_records(&probes(None));
        let control = exec.control();

        exec.execute_with(|index, _, _| {
            if index == 0 {
                control.pause();
                let stopper = control.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    stopper.stop();
                });
            }
        });

        assert_eq!(*ran.lock().unwrap(), vec![0]);
    }

    #[test]
    fn saved_script_reloads_to_the_same_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");
        let ran = Arc::new(Mutex::new(Vec::new()));

        let mut exec = executor(&ran, false);
        exec.load_records(&[
            Record::new("navigate").with("url", "https://a.example"),
            Record::new("pause").with("seconds", 0.5),
            Record::new("save_text").with("tag", "end"),
        ]);
        exec.save_to_file(&path).unwrap();

        let mut reloaded = executor(&ran, false);
        reloaded.load_file(&path).unwrap();

        assert!(reloaded.load_errors().is_empty());
        assert_eq!(reloaded.to_script(), exec.to_script());
        assert_eq!(
            reloaded.to_script().commands[0].get("wait_for_load"),
            Some(&Value::Bool(true))
        );
    }
}
