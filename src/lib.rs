//! # sdnlab - Launcher for emulated SDN test networks
//!
//! This library builds small software-defined networks for controller
//! experiments: hosts in network namespaces, Open vSwitch bridges that speak
//! OpenFlow to a remote controller, and a marker web page on every host.
//!
//! ## Overview
//!
//! A topology is named on the command line (`single,3`, `tree,2`, `assign1`,
//! ...). The launcher builds the graph, assigns deterministic addresses,
//! instantiates the network, announces every host with gratuitous ARPs so the
//! controller learns their locations, starts the marker services, and hands
//! the network to an interactive console. Leaving the console tears
//! everything down again.
//!
//! ## Architecture
//!
//! - `topology`: topology graph, named generators and the spec parser
//! - `ip`: MAC/IP/datapath-id assignment and interface numbering
//! - `emulation`: engine traits and the namespace/Open vSwitch engine
//! - `process`: per-host work (ARP priming, marker services)
//! - `orchestrator`: lifecycle of one network, with guaranteed teardown
//! - `session`: interactive operator console
//! - `responder`: HTTP server behind the `marker-httpd` binary
//! - `config`, `config_loader`: YAML lab configuration
//! - `error`: error taxonomy and per-phase reports
//! - `utils`: binary resolution helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sdnlab::config::LabConfig;
//! use sdnlab::emulation::NetnsEmulator;
//! use sdnlab::orchestrator::run_lab;
//! use sdnlab::session::ConsoleSession;
//! use sdnlab::topology::TopologySpec;
//!
//! let spec: TopologySpec = "tree,2".parse()?;
//! let config = LabConfig::default();
//! let engine = NetnsEmulator::new(&config.engine.namespace_prefix);
//!
//! run_lab(spec.build()?, engine, config, &mut ConsoleSession::stdio())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library errors are typed (`thiserror`); the binaries report them through
//! `color_eyre` with context.

pub mod config;
pub mod config_loader;
pub mod emulation;
pub mod error;
pub mod ip;
pub mod orchestrator;
pub mod process;
pub mod responder;
pub mod session;
pub mod topology;
pub mod utils;
