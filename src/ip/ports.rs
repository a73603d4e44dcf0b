//! Interface numbering.
//!
//! Each node numbers its link interfaces in link insertion order. Host ports
//! start at 0, so a host's first link is its primary interface `h1-eth0`;
//! switch ports start at 1, matching OpenFlow port numbers.

use std::collections::HashMap;

use serde::Serialize;

use crate::topology::{NodeKind, TopologyGraph};

/// Linux refuses interface names longer than this
pub const IFNAMSIZ_MAX: usize = 15;

/// One end of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Port {
    pub node: String,
    pub kind: NodeKind,
    pub number: u32,
    pub interface: String,
}

/// Both ends of a link, in the order the link was added
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPorts {
    pub a: Port,
    pub b: Port,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interface name '{0}' exceeds {IFNAMSIZ_MAX} characters")]
pub struct InterfaceNameError(pub String);

pub fn interface_name(node: &str, number: u32) -> String {
    format!("{node}-eth{number}")
}

/// Assign a port on each endpoint for every link of `graph`
pub fn number_ports(graph: &TopologyGraph) -> Result<Vec<LinkPorts>, InterfaceNameError> {
    let mut next: HashMap<String, u32> = HashMap::new();

    let mut allocate = |node: &str| -> Result<Port, InterfaceNameError> {
        // add_link guarantees both endpoints exist
        let kind = graph.node(node).map_or(NodeKind::Switch, |n| n.kind);
        let first = match kind {
            NodeKind::Host => 0,
            NodeKind::Switch => 1,
        };
        let counter = next.entry(node.to_string()).or_insert(first);
        let number = *counter;
        *counter += 1;

        let interface = interface_name(node, number);
        if interface.len() > IFNAMSIZ_MAX {
            return Err(InterfaceNameError(interface));
        }
        Ok(Port {
            node: node.to_string(),
            kind,
            number,
            interface,
        })
    };

    graph
        .edges()
        .iter()
        .map(|edge| {
            Ok(LinkPorts {
                a: allocate(&edge.a)?,
                b: allocate(&edge.b)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::generators;

    #[test]
    fn test_host_ports_from_zero_switch_ports_from_one() {
        let graph = generators::single(2).unwrap();
        let links = number_ports(&graph).unwrap();

        assert_eq!(links[0].a.interface, "h1-eth0");
        assert_eq!(links[0].b.interface, "s1-eth1");
        assert_eq!(links[1].a.interface, "h2-eth0");
        assert_eq!(links[1].b.interface, "s1-eth2");
        assert_eq!(links[1].b.number, 2);
    }

    #[test]
    fn test_ports_follow_link_order() {
        let graph = generators::triangle().unwrap();
        let links = number_ports(&graph).unwrap();

        // s1: h1 first, then s2, then s3 (via "s3-s1")
        let s1_ports: Vec<&str> = links
            .iter()
            .flat_map(|l| [&l.a, &l.b])
            .filter(|p| p.node == "s1")
            .map(|p| p.interface.as_str())
            .collect();
        assert_eq!(s1_ports, vec!["s1-eth1", "s1-eth2", "s1-eth3"]);
    }

    #[test]
    fn test_long_names_rejected() {
        let mut graph = TopologyGraph::new();
        graph.add_host("averyverylonghost").unwrap();
        graph.add_switch("s1").unwrap();
        graph.add_link("averyverylonghost", "s1").unwrap();

        let err = number_ports(&graph).unwrap_err();
        assert_eq!(err, InterfaceNameError("averyverylonghost-eth0".to_string()));
    }
}
