use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use qwsengine::executor::{ExecutorControl, Progress};

/// Events streamed to the dashboard via SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RunEvent {
    Progress {
        index: usize,
        total: usize,
        description: String,
    },
    Log {
        level: &'static str,
        line: String,
    },
    Finished {
        success: bool,
        summary: String,
    },
}

impl RunEvent {
    fn name(&self) -> &'static str {
        match self {
            RunEvent::Progress { .. } => "progress",
            RunEvent::Log { .. } => "log",
            RunEvent::Finished { .. } => "finished",
        }
    }

    fn to_sse_event(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Event::default().event(self.name()).data(data)
    }
}

#[derive(Clone)]
struct AppState {
    control: ExecutorControl,
    event_tx: broadcast::Sender<RunEvent>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ControlAction {
    Pause,
    Resume,
    Stop,
}

#[derive(Deserialize)]
struct ControlPayload {
    action: ControlAction,
}

/// Bind the dashboard on `first_port` or one of the nine ports after it.
/// Returns the sender run events should be published on.
pub async fn start_server(
    first_port: u16,
    control: ExecutorControl,
) -> Result<broadcast::Sender<RunEvent>> {
    let (event_tx, _) = broadcast::channel::<RunEvent>(256);
    let state = Arc::new(AppState {
        control,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/events", get(sse_handler))
        .route("/control", post(control_handler))
        .route(
            "/favicon.ico",
            get(|| async { axum::http::StatusCode::NO_CONTENT }),
        )
        .with_state(state);

    let mut bound = None;
    for port in first_port..first_port.saturating_add(10) {
        if let Ok(listener) = tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            bound = Some((listener, port));
            break;
        }
    }
    let Some((listener, port)) = bound else {
        anyhow::bail!("could not bind the dashboard to any port from {first_port}");
    };

    tracing::info!("dashboard running at http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("dashboard server stopped: {e}");
        }
    });

    Ok(event_tx)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn control_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ControlPayload>,
) -> Json<Progress> {
    tracing::info!(action = ?payload.action, "control request");
    match payload.action {
        ControlAction::Pause => state.control.pause(),
        ControlAction::Resume => state.control.resume(),
        ControlAction::Stop => state.control.stop(),
    }
    Json(state.control.progress())
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<RunEvent, _>| match result {
            Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
            Err(_) => None,
        });
    Sse::new(stream)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>qws run</title>
<style>
  body { background: #0a0a0f; color: #e0e0e0; font-family: system-ui, sans-serif; margin: 0; }
  header { padding: 16px 24px; border-bottom: 1px solid #1a1a2e; display: flex; gap: 8px; align-items: center; }
  header h1 { font-size: 18px; margin: 0 16px 0 0; }
  #progress { margin-left: auto; font-family: monospace; }
  button { background: #6366f1; color: #fff; border: none; border-radius: 6px; padding: 8px 16px; cursor: pointer; }
  button.stop { background: #ef4444; }
  #log { padding: 16px 24px; font-family: 'Fira Code', monospace; font-size: 13px; white-space: pre-wrap; }
  .ERROR { color: #fca5a5; }
  .WARNING { color: #fcd34d; }
  .done { color: #86efac; }
</style>
</head>
<body>
  <header>
    <h1>qws</h1>
    <button onclick="control('pause')">Pause</button>
    <button onclick="control('resume')">Resume</button>
    <button class="stop" onclick="control('stop')">Stop</button>
    <span id="progress">waiting...</span>
  </header>
  <div id="log"></div>
<script>
  const log = document.getElementById('log');
  const progress = document.getElementById('progress');

  function line(cls, text) {
    const div = document.createElement('div');
    div.className = cls;
    div.textContent = text;
    log.appendChild(div);
    window.scrollTo(0, document.body.scrollHeight);
  }

  async function control(action) {
    await fetch('/control', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({action}),
    });
  }

  const es = new EventSource('/events');
  es.addEventListener('progress', e => {
    const d = JSON.parse(e.data);
    progress.textContent = (d.index + 1) + '/' + d.total + ' ' + d.description;
  });
  es.addEventListener('log', e => {
    const d = JSON.parse(e.data);
    line(d.level, d.line);
  });
  es.addEventListener('finished', e => {
    const d = JSON.parse(e.data);
    progress.textContent = d.success ? 'done' : 'finished with errors';
    line('done', d.summary);
  });
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_actions_deserialize_lowercase() {
        let payload: ControlPayload = serde_json::from_str(r#"{"action": "pause"}"#).unwrap();
        assert_eq!(payload.action, ControlAction::Pause);
        assert!(serde_json::from_str::<ControlPayload>(r#"{"action": "Jump"}"#).is_err());
    }

    #[test]
    fn events_serialize_without_a_tag() {
        let event = RunEvent::Progress {
            index: 1,
            total: 3,
            description: "pause({\"seconds\":1.0})".into(),
        };
        assert_eq!(event.name(), "progress");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"index": 1, "total": 3, "description": "pause({\"seconds\":1.0})"})
        );
    }
}
