//! Address registry.
//!
//! Tracks which node owns each IP, MAC and datapath id so the address plan
//! can never hand the same identifier to two nodes.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::allocator::{Dpid, MacAddr};

/// Errors raised when an identifier is already owned by another node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("IP {ip} already assigned to {owner}")]
    IpTaken { ip: Ipv4Addr, owner: String },

    #[error("MAC {mac} already assigned to {owner}")]
    MacTaken { mac: MacAddr, owner: String },

    #[error("datapath id {dpid} already assigned to {owner}")]
    DpidTaken { dpid: Dpid, owner: String },
}

/// Central registry of assigned addresses, keyed by address
#[derive(Debug, Default)]
pub struct AddressRegistry {
    ips: HashMap<Ipv4Addr, String>,
    macs: HashMap<MacAddr, String>,
    dpids: HashMap<Dpid, String>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an IP for `node`. Re-registering the same pair is a no-op.
    pub fn register_ip(&mut self, ip: Ipv4Addr, node: &str) -> Result<(), RegistryError> {
        match self.ips.get(&ip) {
            Some(owner) if owner != node => Err(RegistryError::IpTaken {
                ip,
                owner: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.ips.insert(ip, node.to_string());
                Ok(())
            }
        }
    }

    pub fn register_mac(&mut self, mac: MacAddr, node: &str) -> Result<(), RegistryError> {
        match self.macs.get(&mac) {
            Some(owner) if owner != node => Err(RegistryError::MacTaken {
                mac,
                owner: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.macs.insert(mac, node.to_string());
                Ok(())
            }
        }
    }

    pub fn register_dpid(&mut self, dpid: Dpid, node: &str) -> Result<(), RegistryError> {
        match self.dpids.get(&dpid) {
            Some(owner) if owner != node => Err(RegistryError::DpidTaken {
                dpid,
                owner: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.dpids.insert(dpid, node.to_string());
                Ok(())
            }
        }
    }

    pub fn is_dpid_taken(&self, dpid: Dpid) -> bool {
        self.dpids.contains_key(&dpid)
    }
}
