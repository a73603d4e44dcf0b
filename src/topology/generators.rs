//! Topology generators.
//!
//! Every generator is deterministic: the same arguments always produce the
//! same node names, link set and insertion order. Hosts are named `h<N>` and
//! switches `s<N>`, both numbered from 1.

use log::warn;

use super::graph::TopologyGraph;
use super::types::TopologyError;

/// Above this many switches a full mesh is almost certainly a typo
pub const MESH_WARN_THRESHOLD: usize = 32;

fn host(n: usize) -> String {
    format!("h{n}")
}

fn switch(n: usize) -> String {
    format!("s{n}")
}

/// One switch with `k` hosts hanging off it.
pub fn single(k: usize) -> Result<TopologyGraph, TopologyError> {
    let mut graph = TopologyGraph::new();
    let hub = switch(1);
    graph.add_switch(&hub)?;
    for i in 1..=k {
        let h = host(i);
        graph.add_host(&h)?;
        graph.add_link(&h, &hub)?;
    }
    Ok(graph)
}

/// `k` switches in a chain, one host per switch.
pub fn linear(k: usize) -> Result<TopologyGraph, TopologyError> {
    let mut graph = TopologyGraph::new();
    let mut last: Option<String> = None;
    for i in 1..=k {
        let s = switch(i);
        let h = host(i);
        graph.add_switch(&s)?;
        graph.add_host(&h)?;
        graph.add_link(&h, &s)?;
        if let Some(prev) = &last {
            graph.add_link(&s, prev)?;
        }
        last = Some(s);
    }
    Ok(graph)
}

/// Balanced binary tree of switches `depth` levels deep, hosts at the leaves.
///
/// Depth 0 is a single host with no switch. Nodes are created depth-first, a
/// switch before its subtree, so `s1` is always the root.
pub fn tree(depth: usize) -> Result<TopologyGraph, TopologyError> {
    const FANOUT: usize = 2;

    struct Counters {
        hosts: usize,
        switches: usize,
    }

    fn grow(
        graph: &mut TopologyGraph,
        depth: usize,
        counters: &mut Counters,
    ) -> Result<String, TopologyError> {
        if depth == 0 {
            counters.hosts += 1;
            let h = host(counters.hosts);
            graph.add_host(&h)?;
            return Ok(h);
        }

        counters.switches += 1;
        let s = switch(counters.switches);
        graph.add_switch(&s)?;
        for _ in 0..FANOUT {
            let child = grow(graph, depth - 1, counters)?;
            graph.add_link(&s, &child)?;
        }
        Ok(s)
    }

    let mut graph = TopologyGraph::new();
    let mut counters = Counters {
        hosts: 0,
        switches: 0,
    };
    grow(&mut graph, depth, &mut counters)?;
    Ok(graph)
}

/// Full mesh of `n` switches, each with its own host.
///
/// The switch core is the complete graph K_n, so the link count is
/// n + n(n-1)/2 and grows quadratically. A few dozen switches is already an
/// impractically dense network; larger values are accepted but logged.
pub fn mesh(n: usize) -> Result<TopologyGraph, TopologyError> {
    if n > MESH_WARN_THRESHOLD {
        warn!(
            "mesh,{} will create {} links; expect a very slow bring-up",
            n,
            n.saturating_add(n.saturating_mul(n - 1) / 2)
        );
    }

    let mut graph = TopologyGraph::new();
    for i in 1..=n {
        let h = host(i);
        let s = switch(i);
        graph.add_host(&h)?;
        graph.add_switch(&s)?;
        graph.add_link(&h, &s)?;
    }
    for i in 1..=n {
        for j in (i + 1)..=n {
            graph.add_link(&switch(i), &switch(j))?;
        }
    }
    Ok(graph)
}

/// Build a graph from fixed host/switch counts and an explicit link list
fn fixed(hosts: usize, switches: usize, links: &[(&str, &str)]) -> Result<TopologyGraph, TopologyError> {
    let mut graph = TopologyGraph::new();
    for i in 1..=hosts {
        graph.add_host(&host(i))?;
    }
    for i in 1..=switches {
        graph.add_switch(&switch(i))?;
    }
    for (a, b) in links {
        graph.add_link(a, b)?;
    }
    Ok(graph)
}

/// Ten hosts on a six-switch backbone; s1 and s4 carry three hosts each.
pub fn assign1() -> Result<TopologyGraph, TopologyError> {
    fixed(
        10,
        6,
        &[
            ("h1", "s1"),
            ("h7", "s1"),
            ("h8", "s1"),
            ("h2", "s2"),
            ("h3", "s3"),
            ("h4", "s4"),
            ("h9", "s4"),
            ("h10", "s4"),
            ("h5", "s5"),
            ("h6", "s6"),
            ("s1", "s2"),
            ("s2", "s3"),
            ("s3", "s4"),
            ("s2", "s5"),
            ("s3", "s6"),
        ],
    )
}

/// Three switches in a ring, one host each.
pub fn triangle() -> Result<TopologyGraph, TopologyError> {
    fixed(
        3,
        3,
        &[
            ("h1", "s1"),
            ("h2", "s2"),
            ("h3", "s3"),
            ("s1", "s2"),
            ("s2", "s3"),
            ("s3", "s1"),
        ],
    )
}

/// Six switches with several independent cycles, four hosts.
pub fn someloops() -> Result<TopologyGraph, TopologyError> {
    fixed(
        4,
        6,
        &[
            ("h1", "s1"),
            ("h2", "s5"),
            ("h3", "s4"),
            ("h4", "s6"),
            ("s1", "s2"),
            ("s2", "s3"),
            ("s3", "s4"),
            ("s3", "s6"),
            ("s2", "s5"),
            ("s5", "s4"),
            ("s4", "s6"),
            ("s6", "s1"),
        ],
    )
}
