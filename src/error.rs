//! Error taxonomy for a lab run.
//!
//! Fatal problems are [`LabError`]s. Per-host problems during priming and
//! marker launch are [`HostOperationFailure`]s: they are collected in a
//! [`PhaseReport`] and never abort the phase.

use serde::Serialize;
use std::fmt;

use crate::emulation::EmulationError;
use crate::ip::AddressError;
use crate::process::HostTask;
use crate::topology::{SpecError, TopologyError};

/// Orchestrator phases, in the only order they may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Phase {
    Built,
    Started,
    Primed,
    Running,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Built => "built",
            Phase::Started => "started",
            Phase::Primed => "primed",
            Phase::Running => "running",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("invalid topology spec: {0}")]
    InvalidTopologySpec(#[from] SpecError),

    #[error("topology construction failed: {0}")]
    Topology(#[from] TopologyError),

    #[error("address assignment failed: {0}")]
    Addressing(#[from] AddressError),

    #[error("emulation engine error: {0}")]
    EmulationEngine(#[from] EmulationError),

    #[error("interactive session failed: {0}")]
    Session(#[from] std::io::Error),

    #[error("operation requires the network to be {expected}, but it is {actual}")]
    OutOfOrder { expected: Phase, actual: Phase },
}

/// A per-host operation that failed without aborting its phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostOperationFailure {
    pub host: String,
    pub operation: HostTask,
    pub reason: String,
}

impl fmt::Display for HostOperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed on {}: {}", self.operation, self.host, self.reason)
    }
}

/// Outcome of a per-host phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// Hosts the operation was attempted on
    pub attempted: usize,
    /// Failures in host insertion order
    pub failures: Vec<HostOperationFailure>,
}

impl PhaseReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_hosts(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.host.as_str())
    }
}
