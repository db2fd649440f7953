//! Remote debugging connection to a device page.
//!
//! Each device port served by the proxy lists its inspectable pages at
//! `/json`, and each page exposes a WebSocket speaking the DevTools wire
//! format: requests carry an `id`, responses echo it back with either a
//! `result` or an `error`, and messages without an `id` are events.
//!
//! [`CdpConnection`] correlates responses through a map of oneshot senders
//! keyed by request id, filled by a reader task that owns the socket's read
//! half. A writer task owns the write half so callers never contend on it.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::http::HttpFetcher;

/// How long a command may wait for its response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// An inspectable page listed by a device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTarget {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	/// Absent while another client holds the page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
}

/// Lists the pages of the device serving on `port`.
pub async fn list_page_targets(fetcher: &dyn HttpFetcher, port: u16) -> Result<Vec<PageTarget>> {
	let url = format!("http://localhost:{port}/json");
	let body = fetcher.get_text(&url).await?;
	Ok(serde_json::from_str(&body)?)
}

/// A protocol event pushed by the page.
#[derive(Debug, Clone, PartialEq)]
pub struct CdpEvent {
	pub method: String,
	pub params: Value,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A live DevTools connection to one page.
pub struct CdpConnection {
	outgoing: mpsc::Sender<String>,
	pending: Pending,
	events: broadcast::Sender<CdpEvent>,
	closed: Arc<AtomicBool>,
	next_id: AtomicU64,
	command_timeout: Duration,
}

impl CdpConnection {
	/// Opens the page WebSocket at `ws_url`.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let (socket, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|e| Error::Transport(format!("failed to connect to {ws_url}: {e}")))?;
		debug!(target = "iosdbg", url = ws_url, "page connection open");

		let (mut sink, mut stream) = socket.split();
		let (outgoing, mut outgoing_rx) = mpsc::channel::<String>(64);
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let (events, _) = broadcast::channel(256);
		let closed = Arc::new(AtomicBool::new(false));

		tokio::spawn(async move {
			while let Some(text) = outgoing_rx.recv().await {
				if let Err(e) = sink.send(Message::Text(text)).await {
					warn!(target = "iosdbg", error = %e, "page connection write failed");
					break;
				}
			}
			let _ = sink.close().await;
		});

		let reader_pending = Arc::clone(&pending);
		let reader_events = events.clone();
		let reader_closed = Arc::clone(&closed);
		tokio::spawn(async move {
			while let Some(frame) = stream.next().await {
				match frame {
					Ok(Message::Text(text)) => dispatch(&text, &reader_pending, &reader_events),
					Ok(Message::Close(_)) => break,
					Ok(_) => {}
					Err(e) => {
						warn!(target = "iosdbg", error = %e, "page connection read failed");
						break;
					}
				}
			}
			debug!(target = "iosdbg", "page connection closed");
			reader_closed.store(true, Ordering::SeqCst);
			for (_, waiter) in reader_pending.lock().drain() {
				let _ = waiter.send(Err(Error::ConnectionClosed));
			}
		});

		Ok(Self {
			outgoing,
			pending,
			events,
			closed,
			next_id: AtomicU64::new(1),
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
		})
	}

	pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
		self.command_timeout = timeout;
		self
	}

	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.events.subscribe()
	}

	/// Sends `method` and waits for its result.
	///
	/// `params` defaults to an empty object. An `error` reply becomes
	/// [`Error::Protocol`].
	pub async fn send_message(&self, method: &str, params: Option<Value>) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request = json!({
			"id": id,
			"method": method,
			"params": params.unwrap_or_else(|| json!({})),
		});

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);
		// The reader drains `pending` once, after setting `closed`.
		if self.closed.load(Ordering::SeqCst) {
			self.pending.lock().remove(&id);
			return Err(Error::ConnectionClosed);
		}
		trace!(target = "iosdbg", id, method, "sending command");

		if self.outgoing.send(request.to_string()).await.is_err() {
			self.pending.lock().remove(&id);
			return Err(Error::ConnectionClosed);
		}

		let reply = match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(reply)) => reply?,
			Ok(Err(_)) => return Err(Error::ConnectionClosed),
			Err(_) => {
				self.pending.lock().remove(&id);
				return Err(Error::Transport(format!(
					"{method} timed out after {}ms",
					self.command_timeout.as_millis()
				)));
			}
		};

		if let Some(error) = reply.get("error") {
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| error.to_string());
			return Err(Error::Protocol {
				method: method.to_string(),
				message,
			});
		}
		Ok(reply.get("result").cloned().unwrap_or(Value::Null))
	}
}

fn dispatch(text: &str, pending: &Pending, events: &broadcast::Sender<CdpEvent>) {
	let Ok(message) = serde_json::from_str::<Value>(text) else {
		warn!(target = "iosdbg", "dropping non-JSON page message");
		return;
	};

	if let Some(id) = message.get("id").and_then(Value::as_u64) {
		match pending.lock().remove(&id) {
			Some(waiter) => {
				let _ = waiter.send(Ok(message));
			}
			None => debug!(target = "iosdbg", id, "reply for unknown request"),
		}
		return;
	}

	if let Some(method) = message.get("method").and_then(Value::as_str) {
		let _ = events.send(CdpEvent {
			method: method.to_string(),
			params: message.get("params").cloned().unwrap_or(Value::Null),
		});
	}
}
