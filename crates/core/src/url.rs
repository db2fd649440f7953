//! Navigation URL for a launch run.

/// Combines a tunnel origin with the URL the caller asked for.
///
/// With both present, the last path segment of `requested` is appended to
/// the tunnel origin, so `http://website.com/index.html` behind
/// `http://localtunnel.me/` becomes `http://localtunnel.me/index.html`.
/// With only one present it is used verbatim. Empty strings count as absent.
pub fn resolve(tunnel_url: Option<&str>, requested: Option<&str>) -> Option<String> {
	let tunnel_url = tunnel_url.filter(|u| !u.is_empty());
	let requested = requested.filter(|u| !u.is_empty());

	match (tunnel_url, requested) {
		(None, None) => None,
		(Some(origin), None) => Some(origin.to_string()),
		(None, Some(requested)) => Some(requested.to_string()),
		(Some(origin), Some(requested)) => {
			let file = requested.rsplit_once('/').map_or(requested, |(_, file)| file);
			Some(format!("{}/{file}", origin.trim_end_matches('/')))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nothing_to_navigate() {
		assert_eq!(resolve(None, None), None);
		assert_eq!(resolve(Some(""), Some("")), None);
	}

	#[test]
	fn tunnel_only_is_verbatim() {
		assert_eq!(resolve(Some("index.html"), None).as_deref(), Some("index.html"));
		assert_eq!(
			resolve(Some("https://abc.localtunnel.me"), None).as_deref(),
			Some("https://abc.localtunnel.me")
		);
	}

	#[test]
	fn requested_only_is_verbatim() {
		assert_eq!(
			resolve(None, Some("http://website.com/index.html")).as_deref(),
			Some("http://website.com/index.html")
		);
	}

	#[test]
	fn merge_keeps_last_segment_on_tunnel_origin() {
		assert_eq!(
			resolve(Some("http://localtunnel.me/"), Some("http://website.com/index.html")).as_deref(),
			Some("http://localtunnel.me/index.html")
		);
		assert_eq!(
			resolve(Some("http://localtunnel.me"), Some("http://website.com/app/page.html")).as_deref(),
			Some("http://localtunnel.me/page.html")
		);
	}

	#[test]
	fn merge_with_bare_file_name() {
		assert_eq!(
			resolve(Some("http://localtunnel.me//"), Some("index.html")).as_deref(),
			Some("http://localtunnel.me/index.html")
		);
	}
}
