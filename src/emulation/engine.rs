//! Emulation engine interface.
//!
//! The orchestrator drives any engine that can add hosts, switches and links,
//! start and stop, and run commands inside a host.

use std::net::Ipv4Addr;

use crate::config::{ControllerConfig, FailMode};
use crate::ip::{Dpid, HostAddress, LinkPorts};

use super::runner::CommandOutput;

/// Errors reported by an emulation engine. All of them are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum EmulationError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("required tool '{0}' not found in PATH")]
    MissingTool(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("{0}")]
    Engine(String),
}

/// How a switch is instantiated
#[derive(Debug, Clone)]
pub struct SwitchSettings<'a> {
    pub dpid: Dpid,
    pub protocol: &'a str,
    pub fail_mode: FailMode,
    pub controller: &'a ControllerConfig,
}

/// A host inside a running emulated network
pub trait EmulatedHost: Send + Sync {
    fn name(&self) -> &str;

    /// Interface carrying the host's address; `None` for an unlinked host
    fn primary_interface(&self) -> Option<&str>;

    fn primary_address(&self) -> Ipv4Addr;

    /// Run a shell command inside the host and capture its output
    fn run_command(&self, command: &str) -> Result<CommandOutput, EmulationError>;
}

/// An emulation engine instance. One instance backs exactly one network.
pub trait Emulator {
    type Host: EmulatedHost;

    fn add_host(&mut self, address: &HostAddress) -> Result<(), EmulationError>;

    fn add_switch(&mut self, name: &str, settings: &SwitchSettings<'_>) -> Result<(), EmulationError>;

    fn add_link(&mut self, link: &LinkPorts) -> Result<(), EmulationError>;

    /// Bring up every link and switch and point switches at the controller
    fn start(&mut self) -> Result<(), EmulationError>;

    /// Release everything the engine created. Must tolerate partial builds.
    fn stop(&mut self) -> Result<(), EmulationError>;

    /// Hosts in the order they were added
    fn hosts(&self) -> &[Self::Host];

    fn host(&self, name: &str) -> Option<&Self::Host> {
        self.hosts().iter().find(|h| h.name() == name)
    }
}
