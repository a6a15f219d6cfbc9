//! Live reload channel
//!
//! A broadcast hub tasks push messages into, the websocket endpoint that
//! forwards them to browsers, and the client script those browsers run.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::ServerState;

/// Route serving the websocket channel
pub const WS_ROUTE: &str = "/__assetline/ws";

/// Route serving the client script
pub const CLIENT_ROUTE: &str = "/__assetline/client.js";

/// Route accepting remote reload requests
pub const RELOAD_ROUTE: &str = "/__assetline/reload";

/// Messages pushed to connected browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    FullReload { reason: String },

    /// Stylesheet rewritten; swap it without reloading the page
    CssUpdate { path: String },

    /// Compilation failed
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
}

/// Handle for signalling connected browsers.
///
/// Sends are fire-and-forget: with no browser connected they are dropped.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadMessage>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Receive every message sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }

    /// Number of connected listeners
    pub fn clients(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Ask every client to reload the page
    pub fn reload(&self, reason: impl Into<String>) {
        self.send(ReloadMessage::FullReload {
            reason: reason.into(),
        });
    }

    /// Push a rewritten stylesheet to every client
    pub fn stream_css(&self, path: impl Into<String>) {
        self.send(ReloadMessage::CssUpdate { path: path.into() });
    }

    /// Surface a compile error in every client
    pub fn error(&self, message: impl Into<String>, file: Option<String>) {
        self.send(ReloadMessage::Error {
            message: message.into(),
            file,
        });
    }

    fn send(&self, message: ReloadMessage) {
        match self.tx.send(message) {
            Ok(n) => debug!("Reload message delivered to {} listener(s)", n),
            Err(_) => debug!("No reload listeners connected"),
        }
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle WebSocket upgrade for live reload
pub async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

/// Handle a live reload WebSocket connection
async fn handle_reload_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before greeting so nothing sent in between is lost
    let mut reload_rx = state.live.subscribe();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Live reload client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match reload_rx.recv().await {
                Ok(message) => {
                    let Ok(json) = serde_json::to_string(&message) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Live reload client lagged by {} message(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Live reload client disconnected");
}

/// Trigger a full reload from outside the process
pub async fn remote_reload(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.live.reload("reload requested");
    StatusCode::NO_CONTENT
}

/// Serve the client script
pub async fn client_script(State(state): State<Arc<ServerState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        client_source(state.notify),
    )
        .into_response()
}

/// Client script source
pub fn client_source(notify: bool) -> String {
    format!(
        r#"// Assetline live reload client
(function() {{
  var NOTIFY = {notify};

  function flash(text) {{
    if (!NOTIFY) return;
    var el = document.createElement('div');
    el.textContent = text;
    el.style.cssText = 'position:fixed;top:0;right:0;z-index:2147483647;padding:8px 12px;' +
      'background:#1d1f21;color:#fff;font:12px sans-serif;';
    document.body.appendChild(el);
    setTimeout(function() {{ el.remove(); }}, 1500);
  }}

  function connect() {{
    var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
    var ws = new WebSocket(scheme + location.host + '{ws}');

    ws.onmessage = function(event) {{
      var message = JSON.parse(event.data);

      switch (message.type) {{
        case 'connected':
          flash('Connected to assetline');
          break;

        case 'full-reload':
          location.reload();
          break;

        case 'css-update':
          var name = message.path.split('/').pop();
          document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
            var url = new URL(link.href);
            if (url.pathname.split('/').pop() !== name) return;
            url.searchParams.set('t', Date.now());
            link.href = url.toString();
          }});
          flash('Injected: ' + name);
          break;

        case 'error':
          console.error('[assetline]', message.message);
          flash('Build error, see console');
          break;
      }}
    }};

    ws.onclose = function() {{
      setTimeout(connect, 1000);
    }};
  }}

  connect();
}})();
"#,
        notify = notify,
        ws = WS_ROUTE,
    )
}

/// Inject the client script tag into HTML
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{}" async></script>"#, CLIENT_ROUTE);

    // Insert before </body> or at the end
    if let Some(pos) = html.rfind("</body>") {
        let mut result = html.to_string();
        result.insert_str(pos, &tag);
        result
    } else {
        format!("{}{}", html, tag)
    }
}
