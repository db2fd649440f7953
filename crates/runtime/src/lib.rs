//! Runtime for iosdbg: everything that touches a process, a socket or the host.
//!
//! - **Platform**: host detection and bundled proxy lookup
//! - **Proxy**: detached spawn and supervision of `ios_webkit_debug_proxy`
//! - **Discovery**: device list polling with bounded backoff
//! - **Tunnel**: public tunnels over a localtunnel-compatible server
//! - **CDP**: WebSocket connection to a device page
//!
//! Each concern sits behind a trait (`PlatformProbe`, `ProxySpawner`,
//! `HttpFetcher`, `TunnelProvider`) so orchestration can run against fakes.

pub mod cdp;
pub mod discovery;
pub mod error;
pub mod http;
pub mod platform;
pub mod proxy;
pub mod tunnel;

pub use cdp::{CdpConnection, CdpEvent, PageTarget, list_page_targets};
pub use discovery::{DiscoveryClient, DiscoveryConfig, discovery_url, parse_devices};
pub use error::{Error, Result};
pub use http::{HttpFetcher, ReqwestFetcher};
pub use platform::{HostPlatform, Platform, PlatformProbe, bundled_proxy_path, default_bundle_dir, resolve_proxy_path};
pub use proxy::{DetachedProxy, ProcessSpawner, ProxyCommand, ProxyExit, ProxyHandle, ProxySpawner, default_proxy_args};
pub use tunnel::{LocalTunnelProvider, Tunnel, TunnelEvent, TunnelProvider};
