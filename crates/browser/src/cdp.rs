//! Call-scoped DevTools protocol transport.
//!
//! One [`Channel`] carries exactly one `Runtime.evaluate` round trip: open
//! the WebSocket, send the command, wait for the correlated reply, close.
//! There is no shared connection state between evaluations, so a broken
//! socket can only ever poison the single call that owns it.

use std::time::Duration;

use chatpilot_core::{BrowserConfig, Error, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Connection options carried into every channel open.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub evaluate_timeout: Duration,
    /// The channel dials the debugger address directly and never consults
    /// proxy environment variables; the flag travels here so the directory
    /// client and the channel share one configuration source.
    pub bypass_proxy: bool,
}

impl TransportSettings {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            evaluate_timeout: Duration::from_secs(config.evaluate_timeout_secs),
            bypass_proxy: config.bypass_proxy,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// An open evaluate channel to one debugging target.
#[derive(Debug)]
pub struct Channel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    timeout: Duration,
}

impl Channel {
    /// Open a WebSocket to the target's debugger address.
    pub async fn open(ws_url: &str, settings: &TransportSettings) -> Result<Self> {
        debug!(url = ws_url, "opening evaluate channel");
        let (ws, _) = tokio::time::timeout(settings.evaluate_timeout, connect_async(ws_url))
            .await
            .map_err(|_| Error::Timeout(format!("connecting to {}", ws_url)))?
            .map_err(|e| Error::Transport(format!("failed to open channel to {}: {}", ws_url, e)))?;

        Ok(Self {
            ws,
            next_id: 1,
            timeout: settings.evaluate_timeout,
        })
    }

    /// Evaluate a script expression in the target page and return its
    /// JSON value. Consumes the channel: the socket is closed once the
    /// correlated reply arrives.
    ///
    /// `Ok(None)` means the page answered but produced no value
    /// (`result.result.value` absent); callers must treat this as "no
    /// information", not as an empty result.
    pub async fn evaluate(mut self, expression: &str) -> Result<Option<Value>> {
        let id = self.next_id;
        self.next_id += 1;

        let envelope = evaluate_envelope(id, expression);
        self.ws
            .send(Message::Text(envelope.to_string()))
            .await
            .map_err(|e| Error::Transport(format!("failed to send evaluate command: {}", e)))?;

        let deadline = self.timeout;
        let ws = &mut self.ws;
        let reply = tokio::time::timeout(deadline, async {
            while let Some(frame) = ws.next().await {
                let msg = match frame {
                    Ok(m) => m,
                    Err(e) => {
                        return Err(Error::Transport(format!("channel read failed: {}", e)));
                    }
                };
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Binary(b) => match String::from_utf8(b) {
                        Ok(s) => s,
                        Err(_) => continue,
                    },
                    Message::Close(_) => {
                        return Err(Error::Transport(
                            "channel closed before the reply arrived".to_string(),
                        ));
                    }
                    _ => continue,
                };
                let json: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "skipping malformed frame");
                        continue;
                    }
                };
                // Events carry a method and no id; replies to other ids are
                // stale. Both are skipped, never surfaced.
                if reply_id(&json) == Some(id) {
                    return Ok(json);
                }
            }
            Err(Error::Transport(
                "channel closed without a reply".to_string(),
            ))
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "no evaluate reply within {}s",
                deadline.as_secs()
            ))
        })??;

        let _ = self.ws.close(None).await;

        if let Some(err) = reply.get("error") {
            return Err(Error::Transport(format!("evaluate failed: {}", err)));
        }
        Ok(extract_value(&reply))
    }
}

/// Build the `Runtime.evaluate` request envelope.
fn evaluate_envelope(id: u64, expression: &str) -> Value {
    json!({
        "id": id,
        "method": "Runtime.evaluate",
        "params": {
            "expression": expression,
            "returnByValue": true,
        },
    })
}

/// Correlation id of a reply frame, if it is a reply at all.
fn reply_id(frame: &Value) -> Option<u64> {
    frame.get("id")?.as_u64()
}

/// Pull `result.result.value` out of a reply, tolerating absence at any
/// level.
fn extract_value(reply: &Value) -> Option<Value> {
    reply.get("result")?.get("result")?.get("value").cloned()
}
