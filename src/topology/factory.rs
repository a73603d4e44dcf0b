//! Topology spec parsing.
//!
//! A topology spec is the single CLI argument: a generator name optionally
//! followed by `,<count>`, e.g. `single,4`, `tree,2`, `triangle`.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};

use super::generators;
use super::graph::TopologyGraph;
use super::types::TopologyError;

/// Names accepted on the command line, in usage order
pub const TOPOLOGY_NAMES: [&str; 7] = [
    "single", "tree", "linear", "assign1", "triangle", "mesh", "someloops",
];

/// Usage line printed when the spec is missing or invalid
pub fn usage() -> String {
    format!(
        "Specify topology {}, or {}",
        TOPOLOGY_NAMES[..TOPOLOGY_NAMES.len() - 1].join(", "),
        TOPOLOGY_NAMES[TOPOLOGY_NAMES.len() - 1]
    )
}

/// Reasons a topology spec is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("Unknown topology '{0}'")]
    UnknownTopology(String),

    #[error("Topology '{name}' requires a {param} parameter (e.g. {name},2)")]
    MissingParameter { name: String, param: &'static str },

    #[error("Topology '{name}' parameter '{value}' is not a non-negative integer")]
    InvalidParameter { name: String, value: String },

    #[error("Topology '{name}' takes a single parameter, got '{spec}'")]
    TooManyParameters { name: String, spec: String },
}

/// A validated topology spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologySpec {
    Single { hosts: usize },
    Tree { depth: usize },
    Linear { length: usize },
    Assign1,
    Triangle,
    Mesh { switches: usize },
    SomeLoops,
}

impl TopologySpec {
    /// Generate the graph this spec describes
    pub fn build(&self) -> Result<TopologyGraph, TopologyError> {
        let graph = match *self {
            TopologySpec::Single { hosts } => generators::single(hosts)?,
            TopologySpec::Tree { depth } => generators::tree(depth)?,
            TopologySpec::Linear { length } => generators::linear(length)?,
            TopologySpec::Assign1 => generators::assign1()?,
            TopologySpec::Triangle => generators::triangle()?,
            TopologySpec::Mesh { switches } => generators::mesh(switches)?,
            TopologySpec::SomeLoops => generators::someloops()?,
        };
        info!(
            "Built topology {}: {} hosts, {} switches, {} links",
            self,
            graph.host_count(),
            graph.switch_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopologySpec::Single { .. } => "single",
            TopologySpec::Tree { .. } => "tree",
            TopologySpec::Linear { .. } => "linear",
            TopologySpec::Assign1 => "assign1",
            TopologySpec::Triangle => "triangle",
            TopologySpec::Mesh { .. } => "mesh",
            TopologySpec::SomeLoops => "someloops",
        }
    }

    fn parameter(&self) -> Option<usize> {
        match *self {
            TopologySpec::Single { hosts } => Some(hosts),
            TopologySpec::Tree { depth } => Some(depth),
            TopologySpec::Linear { length } => Some(length),
            TopologySpec::Mesh { switches } => Some(switches),
            TopologySpec::Assign1 | TopologySpec::Triangle | TopologySpec::SomeLoops => None,
        }
    }
}

impl fmt::Display for TopologySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameter() {
            Some(p) => write!(f, "{},{}", self.name(), p),
            None => f.write_str(self.name()),
        }
    }
}

/// Plain decimal digits only: no sign, no whitespace, no fraction
fn parse_count(name: &str, value: &str) -> Result<usize, SpecError> {
    let invalid = || SpecError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<usize>().map_err(|_| invalid())
}

impl FromStr for TopologySpec {
    type Err = SpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = spec.split(',').collect();
        let name = parts[0];

        let required = |param: &'static str| -> Result<usize, SpecError> {
            match parts.as_slice() {
                [_, value] => parse_count(name, value),
                [_] => Err(SpecError::MissingParameter {
                    name: name.to_string(),
                    param,
                }),
                _ => Err(SpecError::TooManyParameters {
                    name: name.to_string(),
                    spec: spec.to_string(),
                }),
            }
        };

        let parsed = match name {
            "single" => TopologySpec::Single {
                hosts: required("fan-out")?,
            },
            "tree" => TopologySpec::Tree {
                depth: required("depth")?,
            },
            "linear" => TopologySpec::Linear {
                length: required("length")?,
            },
            "mesh" => TopologySpec::Mesh {
                switches: required("switch count")?,
            },
            "assign1" => TopologySpec::Assign1,
            "triangle" => TopologySpec::Triangle,
            "someloops" => TopologySpec::SomeLoops,
            other => return Err(SpecError::UnknownTopology(other.to_string())),
        };

        if parsed.parameter().is_none() && parts.len() > 1 {
            warn!("Topology '{}' takes no parameter; ignoring '{}'", name, parts[1..].join(","));
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parameterized() {
        assert_eq!("single,4".parse::<TopologySpec>(), Ok(TopologySpec::Single { hosts: 4 }));
        assert_eq!("tree,0".parse::<TopologySpec>(), Ok(TopologySpec::Tree { depth: 0 }));
        assert_eq!("linear,12".parse::<TopologySpec>(), Ok(TopologySpec::Linear { length: 12 }));
        assert_eq!("mesh,5".parse::<TopologySpec>(), Ok(TopologySpec::Mesh { switches: 5 }));
    }

    #[test]
    fn test_parse_fixed() {
        assert_eq!("assign1".parse::<TopologySpec>(), Ok(TopologySpec::Assign1));
        assert_eq!("triangle".parse::<TopologySpec>(), Ok(TopologySpec::Triangle));
        assert_eq!("someloops".parse::<TopologySpec>(), Ok(TopologySpec::SomeLoops));
        // Extra parameter on a fixed topology is ignored
        assert_eq!("triangle,7".parse::<TopologySpec>(), Ok(TopologySpec::Triangle));
    }

    #[test]
    fn test_missing_parameter() {
        let err = "single".parse::<TopologySpec>().unwrap_err();
        assert!(matches!(err, SpecError::MissingParameter { .. }));
    }

    #[test]
    fn test_non_digit_parameters() {
        for spec in ["single,abc", "tree,-1", "mesh,+3", "linear,2.5", "single,", "single, 3", "mesh,٣"] {
            let err = spec.parse::<TopologySpec>().unwrap_err();
            assert!(
                matches!(err, SpecError::InvalidParameter { .. }),
                "{spec} should be rejected as an invalid parameter, got {err:?}"
            );
        }
    }

    #[test]
    fn test_overflowing_parameter() {
        let err = "linear,99999999999999999999999999".parse::<TopologySpec>().unwrap_err();
        assert!(matches!(err, SpecError::InvalidParameter { .. }));
    }

    #[test]
    fn test_too_many_parameters() {
        let err = "single,3,4".parse::<TopologySpec>().unwrap_err();
        assert!(matches!(err, SpecError::TooManyParameters { .. }));
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        for spec in ["unknown", "", "Single,3", "ring,3"] {
            let err = spec.parse::<TopologySpec>().unwrap_err();
            assert!(matches!(err, SpecError::UnknownTopology(_)), "{spec}");
        }
    }

    #[test]
    fn test_display_round_trips_to_same_spec() {
        let spec: TopologySpec = "mesh,3".parse().unwrap();
        assert_eq!(spec.to_string(), "mesh,3");
        assert_eq!(TopologySpec::SomeLoops.to_string(), "someloops");
    }

    #[test]
    fn test_usage_lists_every_topology() {
        let text = usage();
        for name in TOPOLOGY_NAMES {
            assert!(text.contains(name), "usage missing {name}");
        }
        assert!(text.ends_with("or someloops"));
    }
}
