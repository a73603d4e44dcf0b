//! Deterministic address allocation.
//!
//! The i-th host in graph insertion order (1-based) gets `base + i` and a MAC
//! whose low bytes are `i`. Switches get a datapath id from the number at the
//! end of their name. The plan depends only on the graph and the addressing
//! settings, so the same topology always gets the same addresses.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::{Serialize, Serializer};

use super::ports::{interface_name, number_ports, InterfaceNameError, LinkPorts};
use super::registry::{AddressRegistry, RegistryError};
use crate::config::AddressingConfig;
use crate::topology::TopologyGraph;

/// Ethernet address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Render `n` into the low 48 bits, e.g. 1 -> 00:00:00:00:00:01
    pub fn from_index(n: u64) -> Self {
        let b = n.to_be_bytes();
        MacAddr([b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// OpenFlow datapath id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Dpid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Addresses assigned to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostAddress {
    pub name: String,
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
    pub mac: MacAddr,
    /// First link interface; `None` for a host with no links
    pub interface: Option<String>,
}

impl HostAddress {
    /// `ip/prefix`, as `ip addr add` wants it
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ip, self.prefix_len)
    }
}

/// Identity assigned to one switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchAddress {
    pub name: String,
    pub dpid: Dpid,
}

/// Errors that can occur while building the address plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("prefix length /{0} is out of range (expected 1-30)")]
    InvalidPrefix(u8),

    #[error("{hosts} hosts do not fit in {base}/{prefix_len}")]
    Exhausted {
        base: Ipv4Addr,
        prefix_len: u8,
        hosts: usize,
    },

    #[error(transparent)]
    Conflict(#[from] RegistryError),

    #[error(transparent)]
    Interface(#[from] InterfaceNameError),
}

/// Every address handed out for one topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPlan {
    pub hosts: Vec<HostAddress>,
    pub switches: Vec<SwitchAddress>,
    pub links: Vec<LinkPorts>,
}

impl AddressPlan {
    /// Assign addresses for every node of `graph`
    pub fn build(graph: &TopologyGraph, config: &AddressingConfig) -> Result<Self, AddressError> {
        let prefix_len = config.prefix_len;
        if !(1..=30).contains(&prefix_len) {
            return Err(AddressError::InvalidPrefix(prefix_len));
        }

        let host_bits = 32 - u32::from(prefix_len);
        // Network and broadcast addresses are not usable
        let capacity = (1u64 << host_bits) - 2;
        let host_count = graph.host_count();
        if host_count as u64 > capacity {
            return Err(AddressError::Exhausted {
                base: config.base,
                prefix_len,
                hosts: host_count,
            });
        }

        let mask = u32::MAX << host_bits;
        let network = u32::from(config.base) & mask;
        if network != u32::from(config.base) {
            warn!(
                "Addressing base {} is not a network address for /{}; using {}",
                config.base,
                prefix_len,
                Ipv4Addr::from(network)
            );
        }

        let links = number_ports(graph)?;
        let mut registry = AddressRegistry::new();

        let mut hosts = Vec::with_capacity(host_count);
        for (i, node) in graph.hosts().enumerate() {
            let index = i as u32 + 1;
            let ip = Ipv4Addr::from(network + index);
            let mac = MacAddr::from_index(u64::from(index));
            registry.register_ip(ip, &node.name)?;
            registry.register_mac(mac, &node.name)?;
            // Host ports are numbered from 0, so a linked host's first port is eth0
            let interface = if graph.links_of(&node.name).next().is_some() {
                Some(interface_name(&node.name, 0))
            } else {
                warn!("Host {} has no links; it will not be addressed", node.name);
                None
            };
            debug!("Assigned {}/{} {} to {}", ip, prefix_len, mac, node.name);
            hosts.push(HostAddress {
                name: node.name.clone(),
                ip,
                prefix_len,
                mac,
                interface,
            });
        }

        let mut switches = Vec::with_capacity(graph.switch_count());
        for (i, node) in graph.switches().enumerate() {
            let dpid = pick_dpid(&node.name, i as u64 + 1, &registry);
            registry.register_dpid(dpid, &node.name)?;
            debug!("Assigned dpid {} to {}", dpid, node.name);
            switches.push(SwitchAddress {
                name: node.name.clone(),
                dpid,
            });
        }

        Ok(Self {
            hosts,
            switches,
            links,
        })
    }

    pub fn host(&self, name: &str) -> Option<&HostAddress> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn switch(&self, name: &str) -> Option<&SwitchAddress> {
        self.switches.iter().find(|s| s.name == name)
    }
}

fn trailing_number(name: &str) -> Option<u64> {
    static TRAILING_DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_DIGITS.get_or_init(|| Regex::new(r"(\d+)$").expect("static regex"));
    re.captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|&n| n > 0)
}

/// Number in the name if it is free, otherwise the first free id from `ordinal`
fn pick_dpid(name: &str, ordinal: u64, registry: &AddressRegistry) -> Dpid {
    if let Some(n) = trailing_number(name) {
        if !registry.is_dpid_taken(Dpid(n)) {
            return Dpid(n);
        }
        warn!("Datapath id {} for {} is taken, falling back to ordinal", n, name);
    }

    let mut candidate = ordinal;
    while registry.is_dpid_taken(Dpid(candidate)) {
        candidate += 1;
    }
    Dpid(candidate)
}
