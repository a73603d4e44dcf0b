//! Per-host task definitions.
//!
//! These name the operations the orchestrator runs once per host, so failures
//! can be reported against the operation that produced them.

use serde::Serialize;
use std::fmt;

/// Enum representing the per-host operations run inside an emulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostTask {
    /// Gratuitous ARP broadcast from the host's primary interface
    Prime,
    /// Marker responder launch
    MarkerLaunch,
    /// Marker responder termination during teardown
    MarkerStop,
}

impl HostTask {
    /// Get the string representation of the task
    pub fn as_str(&self) -> &'static str {
        match self {
            HostTask::Prime => "prime",
            HostTask::MarkerLaunch => "marker launch",
            HostTask::MarkerStop => "marker stop",
        }
    }
}

impl fmt::Display for HostTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
