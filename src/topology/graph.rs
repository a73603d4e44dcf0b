//! Topology graph.
//!
//! Hosts and switches share one name space. Nodes and edges keep their
//! insertion order because address assignment downstream depends on it.

use std::collections::HashMap;

use serde::Serialize;

use super::types::{Edge, Node, NodeKind, TopologyError};

/// Ordered collection of nodes and links, built incrementally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host. Fails if the name is already taken by any node.
    pub fn add_host(&mut self, name: &str) -> Result<(), TopologyError> {
        self.add_node(name, NodeKind::Host)
    }

    /// Register a switch. Fails if the name is already taken by any node.
    pub fn add_switch(&mut self, name: &str) -> Result<(), TopologyError> {
        self.add_node(name, NodeKind::Switch)
    }

    fn add_node(&mut self, name: &str, kind: NodeKind) -> Result<(), TopologyError> {
        if let Some(&idx) = self.index.get(name) {
            return Err(TopologyError::DuplicateName {
                name: name.to_string(),
                existing: self.nodes[idx].kind,
            });
        }

        let idx = self.nodes.len();
        self.index.insert(name.to_string(), idx);
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    /// Register a link between two nodes that already exist.
    ///
    /// Parallel links are accepted; none of the generators produce them.
    pub fn add_link(&mut self, a: &str, b: &str) -> Result<(), TopologyError> {
        for endpoint in [a, b] {
            if !self.index.contains_key(endpoint) {
                return Err(TopologyError::UnknownNode {
                    a: a.to_string(),
                    b: b.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }

        self.edges.push(Edge {
            a: a.to_string(),
            b: b.to_string(),
        });
        Ok(())
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All links in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Hosts in insertion order
    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_host())
    }

    /// Switches in insertion order
    pub fn switches(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_switch())
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn host_count(&self) -> usize {
        self.hosts().count()
    }

    pub fn switch_count(&self) -> usize {
        self.switches().count()
    }

    /// Links touching `name`, in insertion order
    pub fn links_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(name))
    }
}
