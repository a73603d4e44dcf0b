use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level lab configuration that mirrors the YAML configuration.
///
/// Every section has defaults, so an empty file (or no file at all) gives the
/// classic setup: remote controller on 127.0.0.1:6653, OpenFlow 1.3 switches,
/// hosts in 10.0.0.0/8, two gratuitous ARPs per host, markers on port 80.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    /// Controller the switches connect to
    pub controller: ControllerConfig,
    /// Switch implementation settings
    pub switch: SwitchConfig,
    /// Host address assignment
    pub addressing: AddressingConfig,
    /// ARP priming
    pub priming: PrimingConfig,
    /// Per-host marker services
    pub marker: MarkerConfig,
    /// Emulation engine settings
    pub engine: EngineConfig,
    /// Threads used for per-host work (priming, marker launch); 1 is sequential
    pub workers: usize,
    /// Pause between starting the network and priming it
    #[serde(with = "humantime_serde")]
    pub settle_time: Duration,
}

/// Remote OpenFlow controller reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl ControllerConfig {
    /// Target string for `ovs-vsctl set-controller`
    pub fn target(&self) -> String {
        format!("tcp:{}:{}", self.ip, self.port)
    }
}

/// Behaviour when a switch loses its controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Drop traffic the controller has not programmed
    Secure,
    /// Fall back to acting as a learning switch
    Standalone,
}

impl FailMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailMode::Secure => "secure",
            FailMode::Standalone => "standalone",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SwitchConfig {
    /// OpenFlow version the switches speak (e.g. "OpenFlow13")
    pub protocol: String,
    pub fail_mode: FailMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AddressingConfig {
    /// Network the host addresses are taken from
    pub base: Ipv4Addr,
    pub prefix_len: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PrimingConfig {
    /// Gratuitous ARP broadcasts sent per host
    pub arping_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    /// Whether marker services are launched at all
    pub enabled: bool,
    /// TCP port the responder listens on inside each host
    pub port: u16,
    /// Per-host scratch directories are created under this path
    pub scratch_root: PathBuf,
    /// Responder binary to copy; defaults to `marker-httpd` next to `sdnlab`
    pub responder: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Prepended to host names to form network namespace names
    pub namespace_prefix: String,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid controller configuration: {0}")]
    InvalidController(String),
    #[error("Invalid switch configuration: {0}")]
    InvalidSwitch(String),
    #[error("Invalid addressing configuration: {0}")]
    InvalidAddressing(String),
    #[error("Invalid priming configuration: {0}")]
    InvalidPriming(String),
    #[error("Invalid marker configuration: {0}")]
    InvalidMarker(String),
    #[error("Invalid engine configuration: {0}")]
    InvalidEngine(String),
    #[error("workers must be at least 1")]
    InvalidWorkers,
}

impl LabConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.controller.port == 0 {
            return Err(ValidationError::InvalidController(
                "port cannot be 0".to_string(),
            ));
        }

        if !self.switch.protocol.starts_with("OpenFlow") {
            return Err(ValidationError::InvalidSwitch(format!(
                "protocol '{}' is not an OpenFlow version (e.g. OpenFlow13)",
                self.switch.protocol
            )));
        }

        if !(1..=30).contains(&self.addressing.prefix_len) {
            return Err(ValidationError::InvalidAddressing(format!(
                "prefix_len {} is out of range (1-30)",
                self.addressing.prefix_len
            )));
        }

        if self.priming.arping_count == 0 {
            return Err(ValidationError::InvalidPriming(
                "arping_count must be at least 1".to_string(),
            ));
        }

        if self.marker.port == 0 {
            return Err(ValidationError::InvalidMarker("port cannot be 0".to_string()));
        }
        if !self.marker.scratch_root.is_absolute() {
            return Err(ValidationError::InvalidMarker(format!(
                "scratch_root '{}' must be an absolute path",
                self.marker.scratch_root.display()
            )));
        }

        if self
            .engine
            .namespace_prefix
            .chars()
            .any(|c| c.is_whitespace() || c == '/')
        {
            return Err(ValidationError::InvalidEngine(format!(
                "namespace_prefix '{}' may not contain whitespace or '/'",
                self.engine.namespace_prefix
            )));
        }

        if self.workers == 0 {
            return Err(ValidationError::InvalidWorkers);
        }

        Ok(())
    }
}

/// Default implementations
impl Default for LabConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            switch: SwitchConfig::default(),
            addressing: AddressingConfig::default(),
            priming: PrimingConfig::default(),
            marker: MarkerConfig::default(),
            engine: EngineConfig::default(),
            workers: 1,
            settle_time: Duration::ZERO,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST,
            port: 6653,
        }
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            protocol: "OpenFlow13".to_string(),
            fail_mode: FailMode::Secure,
        }
    }
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            base: Ipv4Addr::new(10, 0, 0, 0),
            prefix_len: 8,
        }
    }
}

impl Default for PrimingConfig {
    fn default() -> Self {
        Self { arping_count: 2 }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 80,
            scratch_root: PathBuf::from("/tmp"),
            responder: None,
        }
    }
}
