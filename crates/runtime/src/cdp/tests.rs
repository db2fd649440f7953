use axum::Router;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;

use super::*;
use crate::http::ReqwestFetcher;

/// Answers every command: `Page.navigate` succeeds, `Fail.me` errors, and
/// `Silent.drop` gets no reply. An event precedes each reply.
async fn page_server() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		while let Ok((stream, _)) = listener.accept().await {
			tokio::spawn(async move {
				let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
				while let Some(Ok(Message::Text(text))) = ws.next().await {
					let request: Value = serde_json::from_str(&text).unwrap();
					let id = request["id"].clone();
					let method = request["method"].as_str().unwrap_or_default().to_string();

					let event = json!({ "method": "Page.frameNavigated", "params": { "for": method } });
					ws.send(Message::Text(event.to_string())).await.unwrap();

					let reply = match method.as_str() {
						"Silent.drop" => continue,
						"Fail.me" => json!({ "id": id, "error": { "code": -32601, "message": "no such method" } }),
						_ => json!({ "id": id, "result": { "echo": request["params"] } }),
					};
					ws.send(Message::Text(reply.to_string())).await.unwrap();
				}
			});
		}
	});
	format!("ws://{addr}/devtools/page/1")
}

#[tokio::test]
async fn send_message_returns_result() {
	let conn = CdpConnection::connect(&page_server().await).await.unwrap();

	let result = conn
		.send_message("Page.navigate", Some(json!({ "url": "https://example.test/" })))
		.await
		.unwrap();
	assert_eq!(result["echo"]["url"], "https://example.test/");

	let result = conn.send_message("Page.enable", None).await.unwrap();
	assert_eq!(result["echo"], json!({}));
}

#[tokio::test]
async fn error_reply_is_protocol_error() {
	let conn = CdpConnection::connect(&page_server().await).await.unwrap();

	let err = conn.send_message("Fail.me", None).await.unwrap_err();
	match err {
		Error::Protocol { method, message } => {
			assert_eq!(method, "Fail.me");
			assert_eq!(message, "no such method");
		}
		other => panic!("expected protocol error, got {other:?}"),
	}
}

#[tokio::test]
async fn events_reach_subscribers() {
	let conn = CdpConnection::connect(&page_server().await).await.unwrap();
	let mut events = conn.subscribe();

	conn.send_message("Runtime.enable", None).await.unwrap();
	let event = events.recv().await.unwrap();
	assert_eq!(event.method, "Page.frameNavigated");
	assert_eq!(event.params["for"], "Runtime.enable");
}

#[tokio::test]
async fn unanswered_command_times_out() {
	let conn = CdpConnection::connect(&page_server().await)
		.await
		.unwrap()
		.with_command_timeout(Duration::from_millis(100));

	let err = conn.send_message("Silent.drop", None).await.unwrap_err();
	assert!(matches!(err, Error::Transport(_)), "{err:?}");
	assert!(conn.pending.lock().is_empty());
}

#[tokio::test]
async fn closed_socket_fails_pending_commands() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let _ = ws.next().await;
		let _ = ws.close(None).await;
	});

	let conn = CdpConnection::connect(&format!("ws://{addr}")).await.unwrap();
	let err = conn.send_message("Page.reload", None).await.unwrap_err();
	assert!(matches!(err, Error::ConnectionClosed), "{err:?}");
}

#[tokio::test]
async fn command_after_close_fails_without_waiting() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let _ = ws.close(None).await;
	});

	let conn = CdpConnection::connect(&format!("ws://{addr}")).await.unwrap();
	while !conn.closed.load(Ordering::SeqCst) {
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let err = tokio::time::timeout(Duration::from_secs(2), conn.send_message("Page.reload", None))
		.await
		.expect("closed connection answers at once")
		.unwrap_err();
	assert!(matches!(err, Error::ConnectionClosed), "{err:?}");
	assert!(conn.pending.lock().is_empty());
}

#[tokio::test]
async fn connect_failure_is_transport_error() {
	let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let port = reserved.local_addr().unwrap().port();
	drop(reserved);

	let err = CdpConnection::connect(&format!("ws://127.0.0.1:{port}"))
		.await
		.err()
		.expect("connect should fail");
	assert!(matches!(err, Error::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn lists_page_targets_of_device() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let app = Router::new().route(
		"/json",
		get(|| async {
			json!([
				{
					"title": "Home",
					"url": "https://example.test/",
					"webSocketDebuggerUrl": "ws://localhost:9222/devtools/page/1"
				},
				{ "title": "Busy", "url": "https://example.test/busy" }
			])
			.to_string()
		}),
	);
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});

	let fetcher = ReqwestFetcher::new().unwrap();
	let pages = list_page_targets(&fetcher, port).await.unwrap();
	assert_eq!(pages.len(), 2);
	assert_eq!(pages[0].web_socket_debugger_url.as_deref(), Some("ws://localhost:9222/devtools/page/1"));
	assert_eq!(pages[1].web_socket_debugger_url, None);
}
