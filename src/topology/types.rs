//! Topology type definitions.
//!
//! Nodes, edges and the errors raised while assembling a graph.

use serde::Serialize;
use std::fmt;

/// Role of a node in the emulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// End system, emulated as an isolated network namespace
    Host,
    /// Packet-forwarding element driven by the external controller
    Switch,
}

impl NodeKind {
    /// Get the string representation of the node kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Host => "host",
            NodeKind::Switch => "switch",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named host or switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_host(&self) -> bool {
        self.kind == NodeKind::Host
    }

    pub fn is_switch(&self) -> bool {
        self.kind == NodeKind::Switch
    }
}

/// A bidirectional link between two nodes.
///
/// Endpoints are kept in the order they were given to `add_link`; that order
/// decides which side gets its interface numbered first, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub a: String,
    pub b: String,
}

impl Edge {
    /// Returns true if `name` is one of the two endpoints
    pub fn touches(&self, name: &str) -> bool {
        self.a == name || self.b == name
    }

    /// Returns true if this edge joins `x` and `y`, in either direction
    pub fn joins(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Errors that can occur while assembling a topology graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("duplicate node name '{name}' (already registered as a {existing})")]
    DuplicateName { name: String, existing: NodeKind },

    #[error("link {a} <-> {b} references unknown node '{missing}'")]
    UnknownNode {
        a: String,
        b: String,
        missing: String,
    },
}
