//! Per-host processes.
//!
//! This module runs the work the orchestrator does once per host: ARP priming
//! and the marker responder lifecycle.

pub mod arping;
pub mod marker;
pub mod types;

// Re-export commonly used items for convenience
pub use arping::{arping_command, prime_host};
pub use marker::{MarkerError, MarkerHandle, MarkerLauncher};
pub use types::HostTask;
