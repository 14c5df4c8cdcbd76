use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use qwsengine::surface::{AutomationSurface, ListenerId, LoadListener, Page, SurfaceError};

/// Set on the outgoing document; a fresh document does not carry it.
const MARK_OUTGOING_JS: &str = "window.__qwsOutgoing = true";
const READY_STATE_JS: &str = "window.__qwsOutgoing === true ? 'outgoing' : document.readyState";
const INNER_TEXT_JS: &str = "document.documentElement ? document.documentElement.innerText : ''";

pub struct LaunchConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// DevTools websocket of a running Chrome to attach to before launching one.
    pub attach_url: Option<String>,
}

#[derive(Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Ask a Chrome started with `--remote-debugging-port` for its browser websocket.
pub async fn debugger_url(port: u16) -> Result<String> {
    let info: VersionInfo = reqwest::get(format!("http://127.0.0.1:{port}/json/version"))
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(info.web_socket_debugger_url)
}

/// Chrome tab exposed as an automation surface.
///
/// Load completion is detected by polling `document.readyState` from
/// `process_events`, so the wait policy must keep event draining on.
pub struct ChromeSurface {
    _browser: Browser,
    page: ChromePage,
    listeners: Vec<(ListenerId, LoadListener)>,
    next_listener: u64,
    /// URL whose load-finished has not been signalled yet.
    pending: Option<String>,
}

impl ChromeSurface {
    pub fn launch(config: &LaunchConfig) -> Result<Self> {
        if let Some(url) = &config.attach_url {
            tracing::info!(%url, "attempting to attach to existing Chrome");
            match Browser::connect(url.clone()) {
                Ok(browser) => {
                    tracing::info!("attached to existing Chrome");
                    let tab = first_tab(&browser)?;
                    return Ok(Self::with_tab(browser, tab));
                }
                Err(e) => tracing::warn!("could not attach, launching instead: {e}"),
            }
        }

        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
            ],
            idle_browser_timeout: std::time::Duration::from_secs(300),
            ..Default::default()
        };

        tracing::info!(headless = config.headless, "starting Chrome");
        let browser = Browser::new(options).context("browser launch failed")?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        tracing::info!("Chrome ready");

        Ok(Self::with_tab(browser, tab))
    }

    fn with_tab(browser: Browser, tab: Arc<Tab>) -> Self {
        Self {
            _browser: browser,
            page: ChromePage { tab },
            listeners: Vec::new(),
            next_listener: 0,
            pending: None,
        }
    }

    fn emit(&self, ok: bool) {
        for (_, listener) in &self.listeners {
            listener(ok);
        }
    }
}

fn first_tab(browser: &Browser) -> Result<Arc<Tab>> {
    let existing = {
        let tabs = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tabs.first().cloned()
    };
    match existing {
        Some(tab) => Ok(tab),
        None => {
            tracing::info!("no tabs found, creating one");
            browser.new_tab()
        }
    }
}

impl AutomationSurface for ChromeSurface {
    fn navigate(&mut self, url: &str) -> Result<(), SurfaceError> {
        if let Err(e) = self.page.tab.evaluate(MARK_OUTGOING_JS, false) {
            tracing::trace!("could not mark the current document: {e}");
        }
        self.page.tab.navigate_to(url)?;
        self.pending = Some(url.to_string());
        Ok(())
    }

    fn current_page(&self) -> Option<&dyn Page> {
        Some(&self.page)
    }

    fn connect_load_finished(&mut self, listener: LoadListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    fn disconnect_load_finished(&mut self, id: ListenerId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    fn process_events(&mut self) {
        let Some(url) = self.pending.as_deref() else {
            return;
        };
        match self.page.tab.evaluate(READY_STATE_JS, false) {
            Ok(result) => {
                if new_document_complete(result.value.as_ref()) {
                    tracing::debug!(url, "document complete");
                    self.pending = None;
                    self.emit(true);
                }
            }
            // Evaluation fails while the old document is being torn down.
            Err(e) => tracing::trace!(url, "readyState not available yet: {e}"),
        }
    }
}

/// Interpret the `READY_STATE_JS` result. The document that was shown when
/// navigation started reports `outgoing` and never counts as loaded.
fn new_document_complete(state: Option<&serde_json::Value>) -> bool {
    state.and_then(|v| v.as_str()) == Some("complete")
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl Page for ChromePage {
    fn markup(&self) -> Result<String, SurfaceError> {
        Ok(self.tab.get_content()?)
    }

    fn rendered_text(&self) -> Result<String, SurfaceError> {
        let result = self.tab.evaluate(INNER_TEXT_JS, false)?;
        Ok(result
            .value
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default())
    }
}
