//! Device list served by the proxy's discovery endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One debuggable device reported by the proxy.
///
/// The proxy reports each device as `{ "url": "localhost:9222", "deviceName": "..." }`.
/// The port is extracted at deserialization time, so a descriptor that exists
/// always carries a usable port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeviceEntry", into = "DeviceEntry")]
pub struct DeviceDescriptor {
	url: String,
	device_name: String,
	device_id: Option<String>,
	port: u16,
}

impl DeviceDescriptor {
	/// Builds a descriptor from a `host:port` address.
	pub fn new(url: impl Into<String>, device_name: impl Into<String>) -> Result<Self, InvalidDeviceUrl> {
		DeviceEntry {
			url: url.into(),
			device_name: device_name.into(),
			device_id: None,
		}
		.try_into()
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn device_name(&self) -> &str {
		&self.device_name
	}

	pub fn device_id(&self) -> Option<&str> {
		self.device_id.as_deref()
	}

	/// Port the device's own debug endpoint listens on.
	pub fn port(&self) -> u16 {
		self.port
	}
}

/// Raw descriptor shape as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEntry {
	url: String,
	#[serde(default)]
	device_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	device_id: Option<String>,
}

impl TryFrom<DeviceEntry> for DeviceDescriptor {
	type Error = InvalidDeviceUrl;

	fn try_from(entry: DeviceEntry) -> Result<Self, Self::Error> {
		let port = port_from_address(&entry.url).ok_or_else(|| InvalidDeviceUrl(entry.url.clone()))?;
		Ok(Self {
			url: entry.url,
			device_name: entry.device_name,
			device_id: entry.device_id,
			port,
		})
	}
}

impl From<DeviceDescriptor> for DeviceEntry {
	fn from(desc: DeviceDescriptor) -> Self {
		Self {
			url: desc.url,
			device_name: desc.device_name,
			device_id: desc.device_id,
		}
	}
}

/// A descriptor `url` that does not end in a numeric port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDeviceUrl(pub String);

impl fmt::Display for InvalidDeviceUrl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "device url {:?} has no port", self.0)
	}
}

impl std::error::Error for InvalidDeviceUrl {}

/// Extracts the port from `host:port`, tolerating a scheme prefix and a path
/// suffix (`ws://localhost:9222/devtools/page/1`).
pub fn port_from_address(address: &str) -> Option<u16> {
	let without_scheme = address.split_once("://").map_or(address, |(_, rest)| rest);
	let authority = without_scheme.split('/').next()?;
	let (_, port) = authority.rsplit_once(':')?;
	port.parse().ok()
}

/// The device the orchestrator settled on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
	pub port: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub device_name: Option<String>,
}

impl ResolvedTarget {
	/// Target used when the proxy reports no devices: the proxy port itself.
	pub fn bare_proxy(port: u16) -> Self {
		Self { port, device_name: None }
	}
}

impl From<&DeviceDescriptor> for ResolvedTarget {
	fn from(desc: &DeviceDescriptor) -> Self {
		Self {
			port: desc.port(),
			device_name: Some(desc.device_name().to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_device_list_in_order() {
		let body = r#"[
			{"url": "localhost:9999", "deviceName": "iphone1"},
			{"url": "localhost:10000", "deviceName": "iphone2", "deviceId": "abc123"}
		]"#;
		let devices: Vec<DeviceDescriptor> = serde_json::from_str(body).unwrap();

		assert_eq!(devices.len(), 2);
		assert_eq!(devices[0].device_name(), "iphone1");
		assert_eq!(devices[0].port(), 9999);
		assert_eq!(devices[1].port(), 10000);
		assert_eq!(devices[1].device_id(), Some("abc123"));
	}

	#[test]
	fn rejects_descriptor_without_port() {
		let body = r#"[{"url": "localhost", "deviceName": "iphone1"}]"#;
		let err = serde_json::from_str::<Vec<DeviceDescriptor>>(body).unwrap_err();
		assert!(err.to_string().contains("has no port"), "{err}");
	}

	#[test]
	fn port_from_address_handles_scheme_and_path() {
		assert_eq!(port_from_address("localhost:9222"), Some(9222));
		assert_eq!(port_from_address("ws://127.0.0.1:9223/devtools/page/1"), Some(9223));
		assert_eq!(port_from_address("[::1]:9224"), Some(9224));
		assert_eq!(port_from_address("localhost"), None);
		assert_eq!(port_from_address("localhost:http"), None);
	}

	#[test]
	fn resolved_target_from_descriptor_keeps_name() {
		let desc = DeviceDescriptor::new("localhost:9999", "iphone1").unwrap();
		let target = ResolvedTarget::from(&desc);
		assert_eq!(target.port, 9999);
		assert_eq!(target.device_name.as_deref(), Some("iphone1"));
	}
}
