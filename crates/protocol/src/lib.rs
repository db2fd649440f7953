//! Wire types for iosdbg launch and attach requests.
//!
//! This crate contains the serde-serializable shapes that cross a process
//! boundary: launch configurations as a debugging front end writes them,
//! the device list served by the proxy's discovery endpoint, and the tunnel
//! assignment returned to the caller.
//!
//! Types in this crate are pure data. Orchestration lives in `iosdbg-rs`,
//! process and network plumbing in `iosdbg-runtime`.

pub mod args;
pub mod device;
pub mod tunnel;

pub use args::*;
pub use device::*;
pub use tunnel::*;
