//! Launch/attach orchestration for debugging web pages on iOS devices.
//!
//! `iosdbg` connects a browser-debugging front end to `ios_webkit_debug_proxy`:
//! it locates and spawns the proxy, waits for its device list, picks a device,
//! optionally opens a public tunnel for a locally served page, attaches a
//! [`DebugSession`] and navigates it.
//!
//! # Example
//!
//! ```ignore
//! use iosdbg::{Collaborators, Orchestrator, OrchestratorConfig};
//! use iosdbg_protocol::LaunchArgs;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = Orchestrator::new(Collaborators::host()?, OrchestratorConfig::default());
//! let args: LaunchArgs = serde_json::from_str(r#"{ "port": 9221, "url": "http://localhost:8080/" }"#)?;
//! let outcome = orchestrator.launch(&args, &session, &CancellationToken::new()).await?;
//! println!("attached to port {}", outcome.target().port);
//! ```

pub mod error;
pub mod orchestrator;
pub mod selector;
pub mod session;
pub mod tunnel;
pub mod url;

pub use error::{Error, ErrorKind, Result};
pub use iosdbg_protocol as protocol;
pub use iosdbg_runtime as runtime;
pub use orchestrator::{AttachOutcome, Collaborators, LaunchOutcome, OrchestrationState, Orchestrator, OrchestratorConfig};
pub use selector::{DeviceCriterion, select};
pub use session::{AttachRequest, DebugSession};
pub use tunnel::{DEFAULT_TUNNEL_TIMEOUT, TunnelHandle, negotiate};
