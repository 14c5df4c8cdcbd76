use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, LoadTimeout, ValidationError};
use crate::record::Record;
use crate::surface::AutomationSurface;

use super::NAVIGATE;

const PENDING: u8 = 0;
const LOADED: u8 = 1;
const FAILED: u8 = 2;

/// Go to a URL, optionally waiting for the page to finish loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigate {
    url: String,
    wait_for_load: bool,
}

impl Navigate {
    pub fn new(url: impl Into<String>, wait_for_load: bool) -> Result<Self, ValidationError> {
        let url = url.into();
        if url.is_empty() {
            return Err(ValidationError::missing("url"));
        }
        Ok(Self { url, wait_for_load })
    }

    pub fn from_record(record: &Record) -> Result<Self, ValidationError> {
        let url = record
            .str_param("url")?
            .ok_or_else(|| ValidationError::missing("url"))?;
        let wait_for_load = record.bool_param("wait_for_load")?.unwrap_or(true);
        Self::new(url, wait_for_load)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn wait_for_load(&self) -> bool {
        self.wait_for_load
    }

    /// Poll the load flag until it is set or the timeout elapses.
    fn await_load(&self, ctx: &mut ExecutionContext, flag: &AtomicU8) -> Result<bool, LoadTimeout> {
        let timeout = ctx.wait.load_timeout;
        let started = Instant::now();
        loop {
            match flag.load(Ordering::SeqCst) {
                LOADED => return Ok(true),
                FAILED => return Ok(false),
                _ => {}
            }
            if started.elapsed() >= timeout {
                return Err(LoadTimeout {
                    url: self.url.clone(),
                    waited: started.elapsed(),
                });
            }
            ctx.drain_events();
            std::thread::sleep(ctx.wait.poll_interval);
        }
    }
}

fn surface(
    ctx: &mut ExecutionContext,
) -> Result<&mut (dyn AutomationSurface + 'static), ExecutionError> {
    ctx.surface.as_deref_mut().ok_or(ExecutionError::NoSurface)
}

impl Command for Navigate {
    fn kind(&self) -> &str {
        NAVIGATE
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        surface(ctx)?;
        ctx.log(format!("Loading URL: {}", self.url));

        // Connect before navigating so a fast load signal is not missed.
        let flag = Arc::new(AtomicU8::new(PENDING));
        let listener = self.wait_for_load.then(|| {
            let flag = Arc::clone(&flag);
            surface(ctx).map(|s| {
                s.connect_load_finished(Box::new(move |ok| {
                    flag.store(if ok { LOADED } else { FAILED }, Ordering::SeqCst);
                }))
            })
        });
        let listener = listener.transpose()?;

        if let Err(source) = surface(ctx)?.navigate(&self.url) {
            if let Some(id) = listener {
                surface(ctx)?.disconnect_load_finished(id);
            }
            return Err(ExecutionError::Navigation {
                url: self.url.clone(),
                source,
            });
        }

        if let Some(id) = listener {
            ctx.log(format!(
                "Waiting for page load (max {}ms)...",
                ctx.wait.load_timeout.as_millis()
            ));
            let outcome = self.await_load(ctx, &flag);
            surface(ctx)?.disconnect_load_finished(id);

            match outcome {
                Ok(ok) => ctx.log(format!("Page load finished (success={ok})")),
                Err(timeout) => ctx.warn(format!("{timeout} - continuing anyway")),
            }

            if ctx.wait.settle_delay > Duration::ZERO {
                ctx.log("Allowing render process to complete painting...");
                let settle = ctx.wait.settle_delay;
                ctx.idle_for(settle);
            }
        }

        ctx.log(format!("URL loaded successfully: {}", self.url));
        Ok(())
    }

    fn to_record(&self) -> Record {
        Record::new(NAVIGATE)
            .with("url", self.url.clone())
            .with("wait_for_load", self.wait_for_load)
    }
}
