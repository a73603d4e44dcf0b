//! Network topology module.
//!
//! This module contains the host/switch graph model, the parametric and
//! fixed topology generators, and the parser that turns a topology spec
//! string (`name[,param]`) into a graph.

pub mod types;
pub mod graph;
pub mod generators;
pub mod factory;

// Re-export key types and functions for easier access
pub use types::{Edge, Node, NodeKind, TopologyError};
pub use graph::TopologyGraph;
pub use factory::{usage, SpecError, TopologySpec, TOPOLOGY_NAMES};
