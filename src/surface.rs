//! Automation surface: the renderer the commands drive.
//!
//! Commands only see these traits. The binary plugs in a Chrome-backed
//! surface; [`MemorySurface`] serves dry runs and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Load-finished callback. Receives the surface's success flag.
pub type LoadListener = Box<dyn Fn(bool) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Content access for the page currently shown by a surface.
pub trait Page {
    fn markup(&self) -> Result<String, SurfaceError>;

    /// Visible text as rendered, without markup.
    fn rendered_text(&self) -> Result<String, SurfaceError>;
}

pub trait AutomationSurface: Send {
    /// Start navigating the current page to `url`.
    fn navigate(&mut self, url: &str) -> Result<(), SurfaceError>;

    fn current_page(&self) -> Option<&dyn Page>;

    fn connect_load_finished(&mut self, listener: LoadListener) -> ListenerId;

    fn disconnect_load_finished(&mut self, id: ListenerId);

    /// Drain pending host events. Called from every polling iteration so a
    /// host loop driving the surface keeps making progress.
    fn process_events(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPage {
    pub url: String,
    pub markup: String,
    pub text: String,
}

impl MemoryPage {
    fn placeholder(url: &str) -> Self {
        Self {
            url: url.to_string(),
            markup: format!(
                "<html><head><title>{url}</title></head><body>Content from {url}</body></html>"
            ),
            text: format!("Content from {url}"),
        }
    }
}

impl Page for MemoryPage {
    fn markup(&self) -> Result<String, SurfaceError> {
        Ok(self.markup.clone())
    }

    fn rendered_text(&self) -> Result<String, SurfaceError> {
        Ok(self.text.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadBehavior {
    /// Fire after this many `process_events` calls; 0 fires inside `navigate`.
    AfterPolls(u32),
    Never,
}

#[derive(Default)]
struct MemoryState {
    pages: HashMap<String, MemoryPage>,
    failing: HashMap<String, String>,
    visits: Vec<String>,
    listeners: Vec<(ListenerId, LoadListener)>,
    next_listener: u64,
    pending_load: Option<u32>,
    polls: usize,
}

impl MemoryState {
    fn emit(&self, ok: bool) {
        for (_, listener) in &self.listeners {
            listener(ok);
        }
    }
}

/// In-memory surface. Clones share state, so a test can keep one handle
/// while the context owns another.
#[derive(Clone)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
    load: LoadBehavior,
    // Snapshot of the current page handed out by `current_page`.
    shown: Option<MemoryPage>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            load: LoadBehavior::AfterPolls(0),
            shown: None,
        }
    }

    /// Serve fixed content for `url` instead of the generated placeholder.
    pub fn with_page(
        self,
        url: impl Into<String>,
        markup: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let page = MemoryPage {
            url: url.clone(),
            markup: markup.into(),
            text: text.into(),
        };
        self.lock().pages.insert(url, page);
        self
    }

    /// Signal load completion only after `polls` calls to `process_events`.
    pub fn with_load_delay(mut self, polls: u32) -> Self {
        self.load = LoadBehavior::AfterPolls(polls);
        self
    }

    /// Never signal load completion.
    pub fn never_finish_loading(mut self) -> Self {
        self.load = LoadBehavior::Never;
        self
    }

    /// Make navigation to `url` fail with `message`.
    pub fn failing_on(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock().failing.insert(url.into(), message.into());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn event_polls(&self) -> usize {
        self.lock().polls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AutomationSurface for MemorySurface {
    fn navigate(&mut self, url: &str) -> Result<(), SurfaceError> {
        let page = {
            let mut state = self.lock();
            state.visits.push(url.to_string());
            if let Some(message) = state.failing.get(url) {
                return Err(SurfaceError::Message(message.clone()));
            }

            let page = state
                .pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| MemoryPage::placeholder(url));

            match self.load {
                LoadBehavior::AfterPolls(0) => {
                    state.pending_load = None;
                    state.emit(true);
                }
                LoadBehavior::AfterPolls(n) => state.pending_load = Some(n),
                LoadBehavior::Never => state.pending_load = None,
            }
            page
        };
        self.shown = Some(page);
        Ok(())
    }

    fn current_page(&self) -> Option<&dyn Page> {
        self.shown.as_ref().map(|page| page as &dyn Page)
    }

    fn connect_load_finished(&mut self, listener: LoadListener) -> ListenerId {
        let mut state = self.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, listener));
        id
    }

    fn disconnect_load_finished(&mut self, id: ListenerId) {
        self.lock().listeners.retain(|(existing, _)| *existing != id);
    }

    fn process_events(&mut self) {
        let mut state = self.lock();
        state.polls += 1;
        if let Some(remaining) = state.pending_load {
            if remaining <= 1 {
                state.pending_load = None;
                state.emit(true);
            } else {
                state.pending_load = Some(remaining - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> LoadListener {
        let counter = Arc::clone(counter);
        Box::new(move |ok| {
            if ok {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[test]
    fn immediate_load_fires_during_navigate() {
        let mut surface = MemorySurface::new();
        let fired = Arc::new(AtomicUsize::new(0));
        surface.connect_load_finished(counting_listener(&fired));

        surface.navigate("https://a.example").unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let page = surface.current_page().unwrap();
        assert!(page.markup().unwrap().contains("Content from https://a.example"));
    }

    #[test]
    fn delayed_load_fires_after_polls() {
        let mut surface = MemorySurface::new().with_load_delay(3);
        let fired = Arc::new(AtomicUsize::new(0));
        surface.connect_load_finished(counting_listener(&fired));

        surface.navigate("https://a.example").unwrap();
        surface.process_events();
        surface.process_events();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        surface.process_events();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnected_listeners_are_not_called() {
        let mut surface = MemorySurface::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let id = surface.connect_load_finished(counting_listener(&fired));
        surface.disconnect_load_finished(id);

        surface.navigate("https://a.example").unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(surface.listener_count(), 0);
    }

    #[test]
    fn clones_share_history() {
        let observer = MemorySurface::new().failing_on("https://down.example", "refused");
        let mut driver = observer.clone();

        driver.navigate("https://a.example").unwrap();
        assert!(driver.navigate("https://down.example").is_err());

        assert_eq!(
            observer.visits(),
            vec!["https://a.example", "https://down.example"]
        );
    }
}
