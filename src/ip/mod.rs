//! Address assignment module.
//!
//! This module hands out the deterministic IP/MAC addresses for hosts,
//! datapath ids for switches, and interface names for every link end.

pub mod registry;
pub mod allocator;
pub mod ports;

// Re-export commonly used types
pub use registry::{AddressRegistry, RegistryError};
pub use allocator::{AddressError, AddressPlan, Dpid, HostAddress, MacAddr, SwitchAddress};
pub use ports::{interface_name, number_ports, InterfaceNameError, LinkPorts, Port};
