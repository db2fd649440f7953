use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::routing::get;
use parking_lot::Mutex;
use serde_json::json;

use super::*;
use crate::http::ReqwestFetcher;

/// Replays scripted responses, repeating the last one forever.
struct ScriptedFetcher {
	responses: Mutex<VecDeque<Result<String>>>,
	calls: AtomicUsize,
}

impl ScriptedFetcher {
	fn new(responses: Vec<Result<String>>) -> Arc<Self> {
		Arc::new(Self {
			responses: Mutex::new(responses.into()),
			calls: AtomicUsize::new(0),
		})
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

fn refused() -> Result<String> {
	Err(Error::Http {
		url: discovery_url(1234),
		message: "connection refused".into(),
	})
}

#[async_trait]
impl HttpFetcher for ScriptedFetcher {
	async fn get_text(&self, _url: &str) -> Result<String> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let mut responses = self.responses.lock();
		if responses.len() > 1 {
			responses.pop_front().unwrap()
		} else {
			match responses.front() {
				Some(Ok(body)) => Ok(body.clone()),
				_ => refused(),
			}
		}
	}
}

fn fast_config() -> DiscoveryConfig {
	DiscoveryConfig {
		timeout: Duration::from_millis(200),
		initial_backoff: Duration::from_millis(5),
		max_backoff: Duration::from_millis(20),
	}
}

fn two_devices() -> String {
	json!([
		{ "url": "localhost:9999", "deviceName": "iphone1" },
		{ "url": "localhost:10000", "deviceName": "iphone2" }
	])
	.to_string()
}

#[test]
fn discovery_url_targets_local_json_endpoint() {
	assert_eq!(discovery_url(9221), "http://localhost:9221/json");
}

#[tokio::test]
async fn returns_devices_in_discovery_order() {
	let fetcher = ScriptedFetcher::new(vec![Ok(two_devices())]);
	let client = DiscoveryClient::new(fetcher.clone(), fast_config());

	let devices = client.discover(1234, &CancellationToken::new()).await.unwrap();
	assert_eq!(devices.len(), 2);
	assert_eq!(devices[0].device_name(), "iphone1");
	assert_eq!(devices[0].port(), 9999);
	assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn empty_list_is_success() {
	let fetcher = ScriptedFetcher::new(vec![Ok("[]".into())]);
	let client = DiscoveryClient::new(fetcher, fast_config());

	let devices = client.discover(1234, &CancellationToken::new()).await.unwrap();
	assert!(devices.is_empty());
}

#[tokio::test]
async fn retries_until_endpoint_answers() {
	let fetcher = ScriptedFetcher::new(vec![refused(), refused(), Ok(two_devices())]);
	let client = DiscoveryClient::new(fetcher.clone(), fast_config());

	let devices = client.discover(1234, &CancellationToken::new()).await.unwrap();
	assert_eq!(devices.len(), 2);
	assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn malformed_json_is_not_retried() {
	let fetcher = ScriptedFetcher::new(vec![Ok("<html>not json</html>".into())]);
	let client = DiscoveryClient::new(fetcher.clone(), fast_config());

	let err = client.discover(1234, &CancellationToken::new()).await.unwrap_err();
	assert!(matches!(err, Error::Discovery(_)), "{err:?}");
	assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn gives_up_after_timeout() {
	let fetcher = ScriptedFetcher::new(vec![refused()]);
	let client = DiscoveryClient::new(fetcher.clone(), fast_config());

	let err = client.discover(1234, &CancellationToken::new()).await.unwrap_err();
	match err {
		Error::DiscoveryTimeout { port, last_error, .. } => {
			assert_eq!(port, 1234);
			assert!(last_error.contains("connection refused"), "{last_error}");
		}
		other => panic!("expected timeout, got {other:?}"),
	}
	assert!(fetcher.calls() > 1, "should have retried");
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
	let fetcher = ScriptedFetcher::new(vec![refused()]);
	let config = DiscoveryConfig {
		timeout: Duration::from_secs(30),
		initial_backoff: Duration::from_secs(10),
		max_backoff: Duration::from_secs(10),
	};
	let client = DiscoveryClient::new(fetcher, config);
	let cancel = CancellationToken::new();

	let trigger = cancel.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(20)).await;
		trigger.cancel();
	});

	let err = tokio::time::timeout(Duration::from_secs(2), client.discover(1234, &cancel))
		.await
		.expect("cancel should end discovery promptly")
		.unwrap_err();
	assert!(matches!(err, Error::Cancelled), "{err:?}");
}

#[tokio::test]
async fn discovers_devices_from_http_endpoint() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let app = Router::new().route("/json", get(|| async { two_devices() }));
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});

	let fetcher = Arc::new(ReqwestFetcher::new().unwrap());
	let client = DiscoveryClient::new(fetcher, DiscoveryConfig::default());

	let devices = client.discover(port, &CancellationToken::new()).await.unwrap();
	assert_eq!(devices.len(), 2);
	assert_eq!(devices[1].device_name(), "iphone2");
	assert_eq!(devices[1].port(), 10000);
}

#[tokio::test]
async fn waits_for_late_starting_endpoint() {
	let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let port = reserved.local_addr().unwrap().port();
	drop(reserved);

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(300)).await;
		let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
		let app = Router::new().route("/json", get(|| async { "[]" }));
		axum::serve(listener, app).await.unwrap();
	});

	let fetcher = Arc::new(ReqwestFetcher::new().unwrap());
	let client = DiscoveryClient::new(fetcher, DiscoveryConfig::default());

	let devices = client.discover(port, &CancellationToken::new()).await.unwrap();
	assert!(devices.is_empty());
}

/// Accepts the request and never answers.
struct HangingFetcher;

#[async_trait]
impl HttpFetcher for HangingFetcher {
	async fn get_text(&self, _url: &str) -> Result<String> {
		std::future::pending().await
	}
}

#[tokio::test]
async fn hanging_request_is_bounded_by_deadline() {
	let client = DiscoveryClient::new(Arc::new(HangingFetcher), fast_config());

	let result = tokio::time::timeout(Duration::from_secs(3), client.discover(1234, &CancellationToken::new()))
		.await
		.expect("discover settles within its budget");

	match result {
		Err(Error::DiscoveryTimeout { port, last_error, .. }) => {
			assert_eq!(port, 1234);
			assert_eq!(last_error, "request timed out");
		}
		other => panic!("expected DiscoveryTimeout, got {other:?}"),
	}
}
