//! Picks the device to attach to from a discovered list.

use iosdbg_protocol::{DeviceDescriptor, ResolvedTarget};
use tracing::debug;

/// Which device the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCriterion<'a> {
	/// First device in discovery order.
	Any,
	/// Device whose name matches, ignoring case.
	Named(&'a str),
}

impl<'a> DeviceCriterion<'a> {
	/// `None`, empty and `*` all mean any device.
	pub fn from_name(name: Option<&'a str>) -> Self {
		match name.map(str::trim) {
			None | Some("") | Some("*") => DeviceCriterion::Any,
			Some(name) => DeviceCriterion::Named(name),
		}
	}
}

/// Resolves the target port for a run. Never fails.
///
/// An unmatched name falls back to the first device, and an empty list falls
/// back to the proxy port itself.
pub fn select(descriptors: &[DeviceDescriptor], criterion: DeviceCriterion<'_>, proxy_port: u16) -> ResolvedTarget {
	let Some(first) = descriptors.first() else {
		debug!(target = "iosdbg", proxy_port, "no devices reported, using proxy port");
		return ResolvedTarget::bare_proxy(proxy_port);
	};

	let chosen = match criterion {
		DeviceCriterion::Any => first,
		DeviceCriterion::Named(name) => {
			let wanted = name.to_lowercase();
			descriptors
				.iter()
				.find(|d| d.device_name().to_lowercase() == wanted)
				.unwrap_or_else(|| {
					debug!(
						target = "iosdbg",
						requested = name,
						fallback = first.device_name(),
						"no device matched, using first"
					);
					first
				})
		}
	};

	ResolvedTarget::from(chosen)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn devices() -> Vec<DeviceDescriptor> {
		vec![
			DeviceDescriptor::new("localhost:9999", "iphone1").unwrap(),
			DeviceDescriptor::new("localhost:10000", "iphone2").unwrap(),
		]
	}

	#[test]
	fn criterion_from_name() {
		assert_eq!(DeviceCriterion::from_name(None), DeviceCriterion::Any);
		assert_eq!(DeviceCriterion::from_name(Some("")), DeviceCriterion::Any);
		assert_eq!(DeviceCriterion::from_name(Some("*")), DeviceCriterion::Any);
		assert_eq!(DeviceCriterion::from_name(Some("iPad")), DeviceCriterion::Named("iPad"));
	}

	#[test]
	fn empty_list_targets_proxy_port() {
		let target = select(&[], DeviceCriterion::Named("iphone1"), 1234);
		assert_eq!(target, ResolvedTarget::bare_proxy(1234));
		assert_eq!(target.device_name, None);
	}

	#[test]
	fn any_takes_first_device() {
		let target = select(&devices(), DeviceCriterion::Any, 1234);
		assert_eq!(target.port, 9999);
		assert_eq!(target.device_name.as_deref(), Some("iphone1"));
	}

	#[test]
	fn name_matches_case_insensitively() {
		let target = select(&devices(), DeviceCriterion::Named("IPHonE2"), 1234);
		assert_eq!(target.port, 10000);
	}

	#[test]
	fn unmatched_name_falls_back_to_first() {
		let target = select(&devices(), DeviceCriterion::Named("nophone"), 1234);
		assert_eq!(target.port, 9999);
	}
}
