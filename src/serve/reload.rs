//! Live-reload signalling over Server-Sent Events.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Path of the SSE endpoint browsers subscribe to.
pub const RELOAD_PATH: &str = "/__assetflow/reload";

/// Script injected into served HTML pages.
pub const RELOAD_SCRIPT: &str = concat!(
    "<script>(function(){var s=new EventSource(\"",
    "/__assetflow/reload",
    "\");s.addEventListener(\"reload\",function(){location.reload();});})();</script>"
);

/// Fan-out point for reload notifications.
///
/// Cloning is cheap; every clone publishes to the same subscribers.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<String>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to reload notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Tell every connected client to reload. Returns how many were notified.
    ///
    /// With nobody connected the notification is dropped.
    pub fn notify(&self, reason: &str) -> usize {
        match self.tx.send(reason.to_string()) {
            Ok(count) => {
                tracing::debug!("Reload sent to {} client(s)", count);
                count
            }
            Err(_) => 0,
        }
    }
}

/// SSE endpoint handler: one `reload` event per notification.
pub async fn reload_events(
    State(hub): State<ReloadHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Live-reload client connected");

    let stream = BroadcastStream::new(hub.subscribe()).filter_map(|msg| async move {
        match msg {
            Ok(reason) => Some(Ok(Event::default().event("reload").data(reason))),
            Err(e) => {
                tracing::warn!("Reload receiver lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Insert the reload script before the last `</body>`, or append it.
pub fn inject_reload_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + RELOAD_SCRIPT.len());
            out.push_str(&html[..idx]);
            out.push_str(RELOAD_SCRIPT);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{}{}", html, RELOAD_SCRIPT),
    }
}
