//! Debug session over the device page's DevTools WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use iosdbg::protocol::SessionOptions;
use iosdbg::runtime::cdp::DEFAULT_COMMAND_TIMEOUT;
use iosdbg::runtime::{CdpConnection, CdpEvent, HttpFetcher, list_page_targets};
use iosdbg::{AttachRequest, DebugSession};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Attaches to the first inspectable page on the selected device port.
pub struct CdpDebugSession {
	fetcher: Arc<dyn HttpFetcher>,
	connection: OnceCell<CdpConnection>,
	trace_messages: AtomicBool,
	command_timeout: Duration,
}

impl CdpDebugSession {
	pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
		Self {
			fetcher,
			connection: OnceCell::new(),
			trace_messages: AtomicBool::new(false),
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
		}
	}

	/// How long each protocol command may wait for its reply.
	pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
		self.command_timeout = timeout;
		self
	}

	pub fn is_attached(&self) -> bool {
		self.connection.initialized()
	}
}

#[async_trait]
impl DebugSession for CdpDebugSession {
	fn setup_logging(&self, options: &SessionOptions) {
		let enabled = options.diagnostic_logging();
		self.trace_messages.store(enabled, Ordering::Relaxed);
		debug!(target = "iosdbg", diagnostic_logging = enabled, "session logging configured");
	}

	async fn attach(&self, request: AttachRequest) -> anyhow::Result<()> {
		let pages = list_page_targets(self.fetcher.as_ref(), request.port)
			.await
			.with_context(|| format!("listing pages on port {}", request.port))?;

		let (page, ws_url) = pages
			.iter()
			.find_map(|page| page.web_socket_debugger_url.as_deref().map(|url| (page, url)))
			.ok_or_else(|| anyhow!("no inspectable page on port {} ({} listed)", request.port, pages.len()))?;

		let connection = CdpConnection::connect(ws_url)
			.await?
			.with_command_timeout(self.command_timeout);
		if self.trace_messages.load(Ordering::Relaxed) {
			tokio::spawn(trace_events(connection.subscribe()));
		}
		self.connection
			.set(connection)
			.map_err(|_| anyhow!("session is already attached"))?;

		info!(
			target = "iosdbg",
			port = request.port,
			title = %page.title,
			url = %page.url,
			source_maps = request.options.source_maps.unwrap_or(false),
			"attached to page"
		);
		Ok(())
	}

	async fn send_message(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
		let connection = self.connection.get().ok_or_else(|| anyhow!("session is not attached"))?;
		let tracing_on = self.trace_messages.load(Ordering::Relaxed);
		if tracing_on {
			info!(target = "iosdbg", method, params = ?params, "-> protocol");
		}

		let result = connection.send_message(method, params).await?;

		if tracing_on {
			info!(target = "iosdbg", method, result = %result, "<- protocol");
		}
		Ok(result)
	}
}

/// Logs page events until the connection goes away.
async fn trace_events(mut events: broadcast::Receiver<CdpEvent>) {
	loop {
		match events.recv().await {
			Ok(event) => info!(target = "iosdbg", method = %event.method, params = %event.params, "<- event"),
			Err(RecvError::Lagged(skipped)) => warn!(target = "iosdbg", skipped, "page events dropped"),
			Err(RecvError::Closed) => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io;

	use async_trait::async_trait;
	use futures_util::{SinkExt, StreamExt};
	use serde_json::json;
	use tokio::net::TcpListener;
	use tokio_tungstenite::tungstenite::Message;

	use super::*;

	/// Page socket that pushes `Page.loadEventFired` before each reply and
	/// never answers `Silent.drop`.
	async fn page_socket() -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
			while let Some(Ok(Message::Text(text))) = ws.next().await {
				let request: Value = serde_json::from_str(&text).unwrap();
				let event = json!({ "method": "Page.loadEventFired", "params": { "timestamp": 1.5 } });
				ws.send(Message::Text(event.to_string())).await.unwrap();
				if request["method"] == "Silent.drop" {
					continue;
				}
				let reply = json!({ "id": request["id"], "result": {} });
				ws.send(Message::Text(reply.to_string())).await.unwrap();
			}
		});
		format!("ws://{addr}/devtools/page/1")
	}

	fn one_page(ws_url: &str) -> Arc<StaticPages> {
		Arc::new(StaticPages(json!([{ "title": "Home", "url": "https://example.test/", "webSocketDebuggerUrl": ws_url }])))
	}

	#[derive(Clone, Default)]
	struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

	impl io::Write for Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn diagnostic_logging_traces_page_events() {
		let captured = Captured::default();
		let writer = captured.clone();
		let subscriber = tracing_subscriber::fmt()
			.with_writer(move || writer.clone())
			.with_ansi(false)
			.finish();
		let _guard = tracing::subscriber::set_default(subscriber);

		let session = CdpDebugSession::new(one_page(&page_socket().await));
		let options = SessionOptions {
			diagnostic_logging: Some(true),
			..Default::default()
		};
		session.setup_logging(&options);
		session.attach(AttachRequest::new(9999, options)).await.unwrap();
		session.send_message("Page.reload", None).await.unwrap();

		let mut traced = false;
		for _ in 0..50 {
			if String::from_utf8_lossy(&captured.0.lock()).contains("Page.loadEventFired") {
				traced = true;
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert!(traced, "page event should be logged");
	}

	#[tokio::test]
	async fn command_timeout_applies_to_session_messages() {
		let session = CdpDebugSession::new(one_page(&page_socket().await)).with_command_timeout(Duration::from_millis(100));
		session.attach(AttachRequest::new(9999, SessionOptions::default())).await.unwrap();
		assert!(session.is_attached());

		let err = tokio::time::timeout(Duration::from_secs(5), session.send_message("Silent.drop", None))
			.await
			.expect("command should time out")
			.unwrap_err();
		assert!(err.to_string().contains("timed out"), "{err}");
	}

	struct StaticPages(Value);

	#[async_trait]
	impl HttpFetcher for StaticPages {
		async fn get_text(&self, _url: &str) -> iosdbg::runtime::Result<String> {
			Ok(self.0.to_string())
		}
	}

	#[tokio::test]
	async fn attach_without_debuggable_page_fails() {
		let session = CdpDebugSession::new(Arc::new(StaticPages(json!([{ "title": "Busy", "url": "https://example.test/" }]))));

		let err = session.attach(AttachRequest::new(9999, SessionOptions::default())).await.unwrap_err();
		assert!(err.to_string().contains("no inspectable page on port 9999"), "{err}");
		assert!(!session.is_attached());
	}

	#[tokio::test]
	async fn send_before_attach_fails() {
		let session = CdpDebugSession::new(Arc::new(StaticPages(json!([]))));
		let err = session.send_message("Page.navigate", None).await.unwrap_err();
		assert!(err.to_string().contains("not attached"));
	}
}
