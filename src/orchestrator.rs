//! Network orchestrator.
//!
//! This module drives one emulated network through its lifecycle:
//! build, start, ARP priming, marker launch, and teardown. Phases are strictly
//! linear; teardown happens exactly once, either explicitly or when the
//! orchestrator is dropped.

use std::time::Duration;

use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::LabConfig;
use crate::emulation::{EmulatedHost, EmulationError, Emulator, SwitchSettings};
use crate::error::{HostOperationFailure, LabError, Phase, PhaseReport};
use crate::ip::AddressPlan;
use crate::process::{prime_host, HostTask, MarkerHandle, MarkerLauncher};
use crate::session::Session;
use crate::topology::{NodeKind, TopologyGraph};

/// Owns the engine and everything launched inside it for one run
pub struct NetworkOrchestrator<E: Emulator> {
    graph: TopologyGraph,
    plan: AddressPlan,
    engine: E,
    config: LabConfig,
    phase: Phase,
    markers: Vec<MarkerHandle>,
    torn_down: bool,
}

impl<E: Emulator> NetworkOrchestrator<E> {
    /// Instantiate `graph` inside `engine`.
    ///
    /// Nodes are added in graph insertion order, then every link. If the
    /// engine fails part way, whatever it already created is released before
    /// the error is returned.
    pub fn build(graph: TopologyGraph, mut engine: E, config: LabConfig) -> Result<Self, LabError> {
        let plan = AddressPlan::build(&graph, &config.addressing)?;

        info!(
            "*** Creating network: {} hosts, {} switches, {} links",
            graph.host_count(),
            graph.switch_count(),
            graph.edge_count()
        );

        if let Err(e) = populate(&mut engine, &graph, &plan, &config) {
            error!("Network construction failed: {}", e);
            if let Err(stop_err) = engine.stop() {
                warn!("Cleanup after failed build also failed: {}", stop_err);
            }
            return Err(e.into());
        }

        Ok(Self {
            graph,
            plan,
            engine,
            config,
            phase: Phase::Built,
            markers: Vec::new(),
            torn_down: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn plan(&self) -> &AddressPlan {
        &self.plan
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Handles of the marker services currently running
    pub fn markers(&self) -> &[MarkerHandle] {
        &self.markers
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), LabError> {
        if self.phase != expected {
            return Err(LabError::OutOfOrder {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Bring up links and switches and connect switches to the controller.
    pub fn start(&mut self) -> Result<(), LabError> {
        self.expect_phase(Phase::Built)?;

        info!("*** Starting network");
        self.engine.start()?;
        self.phase = Phase::Started;

        let settle = self.config.settle_time;
        if settle > Duration::ZERO {
            info!("*** Waiting {:?} for switches to connect", settle);
            std::thread::sleep(settle);
        }
        Ok(())
    }

    /// Announce every host with gratuitous ARPs so the controller learns it.
    pub fn prime_reachability(&mut self) -> Result<PhaseReport, LabError> {
        self.expect_phase(Phase::Started)?;

        let count = self.config.priming.arping_count;
        let outcomes = self.for_each_host(|host| prime_host(host, count));

        let report = collect_report(HostTask::Prime, outcomes, |_| ());
        self.phase = Phase::Primed;
        Ok(report)
    }

    /// Start a marker responder on every host.
    ///
    /// Uses the responder named in the configuration. When marker services
    /// are disabled, nothing is launched and the phase still advances.
    pub fn launch_marker_services(&mut self) -> Result<PhaseReport, LabError> {
        self.expect_phase(Phase::Primed)?;

        if !self.config.marker.enabled {
            info!("*** Marker services disabled");
            self.phase = Phase::Running;
            return Ok(PhaseReport::default());
        }

        match MarkerLauncher::from_config(&self.config.marker) {
            Ok(launcher) => self.launch_marker_services_with(&launcher),
            Err(e) => {
                warn!("Cannot launch marker services: {}", e);
                let reason = e.to_string();
                let failures = self
                    .engine
                    .hosts()
                    .iter()
                    .map(|host| HostOperationFailure {
                        host: host.name().to_string(),
                        operation: HostTask::MarkerLaunch,
                        reason: reason.clone(),
                    })
                    .collect::<Vec<_>>();
                self.phase = Phase::Running;
                Ok(PhaseReport {
                    attempted: failures.len(),
                    failures,
                })
            }
        }
    }

    /// Start a marker responder on every host using `launcher`.
    pub fn launch_marker_services_with(&mut self, launcher: &MarkerLauncher) -> Result<PhaseReport, LabError> {
        self.expect_phase(Phase::Primed)?;

        let outcomes = self.for_each_host(|host| launcher.launch(host).map_err(|e| e.to_string()));

        let mut handles = Vec::new();
        let report = collect_report(HostTask::MarkerLaunch, outcomes, |handle| handles.push(handle));
        info!(
            "*** Marker services running on {} of {} hosts (port {})",
            handles.len(),
            report.attempted,
            launcher.port()
        );

        self.markers = handles;
        self.phase = Phase::Running;
        Ok(report)
    }

    /// Stop every marker through its handle, then stop the engine.
    ///
    /// Runs at most once; later calls return an empty report. Marker stop
    /// failures are reported, not fatal.
    pub fn teardown(&mut self) -> Result<PhaseReport, LabError> {
        if self.torn_down {
            return Ok(PhaseReport::default());
        }
        self.torn_down = true;

        let mut report = PhaseReport::default();
        if !self.markers.is_empty() {
            info!("*** Stopping {} marker services", self.markers.len());
        }
        for handle in std::mem::take(&mut self.markers) {
            report.attempted += 1;
            let result = match self.engine.host(&handle.host) {
                Some(host) => handle.stop(host).map_err(|e| e.to_string()),
                None => Err(EmulationError::UnknownNode(handle.host.clone()).to_string()),
            };
            if let Err(reason) = result {
                warn!("Failed to stop marker on {}: {}", handle.host, reason);
                report.failures.push(HostOperationFailure {
                    host: handle.host.clone(),
                    operation: HostTask::MarkerStop,
                    reason,
                });
            }
        }

        self.phase = Phase::Stopped;
        self.engine.stop()?;
        info!("*** Done");
        Ok(report)
    }

    /// Run `op` for every host, in parallel when more than one worker is
    /// configured. Results are in host insertion order.
    fn for_each_host<T, F>(&self, op: F) -> Vec<(String, Result<T, String>)>
    where
        T: Send,
        F: Fn(&E::Host) -> Result<T, String> + Sync,
    {
        let hosts = self.engine.hosts();
        let run = |host: &E::Host| (host.name().to_string(), op(host));

        let workers = self.config.workers.min(hosts.len()).max(1);
        if workers == 1 {
            return hosts.iter().map(run).collect();
        }

        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| hosts.par_iter().map(run).collect()),
            Err(e) => {
                warn!("Could not start {} workers ({}), running sequentially", workers, e);
                hosts.iter().map(run).collect()
            }
        }
    }
}

impl<E: Emulator> Drop for NetworkOrchestrator<E> {
    fn drop(&mut self) {
        if !self.torn_down {
            if let Err(e) = self.teardown() {
                error!("Teardown failed: {}", e);
            }
        }
    }
}

/// Feed nodes (insertion order) and links to the engine
fn populate<E: Emulator>(
    engine: &mut E,
    graph: &TopologyGraph,
    plan: &AddressPlan,
    config: &LabConfig,
) -> Result<(), EmulationError> {
    for node in graph.nodes() {
        match node.kind {
            NodeKind::Host => {
                let address = plan
                    .host(&node.name)
                    .ok_or_else(|| EmulationError::UnknownNode(node.name.clone()))?;
                engine.add_host(address)?;
            }
            NodeKind::Switch => {
                let switch = plan
                    .switch(&node.name)
                    .ok_or_else(|| EmulationError::UnknownNode(node.name.clone()))?;
                let settings = SwitchSettings {
                    dpid: switch.dpid,
                    protocol: &config.switch.protocol,
                    fail_mode: config.switch.fail_mode,
                    controller: &config.controller,
                };
                engine.add_switch(&node.name, &settings)?;
            }
        }
    }

    for link in &plan.links {
        engine.add_link(link)?;
    }
    Ok(())
}

fn collect_report<T>(
    task: HostTask,
    outcomes: Vec<(String, Result<T, String>)>,
    mut on_success: impl FnMut(T),
) -> PhaseReport {
    let mut report = PhaseReport {
        attempted: outcomes.len(),
        failures: Vec::new(),
    };
    for (host, outcome) in outcomes {
        match outcome {
            Ok(value) => on_success(value),
            Err(reason) => {
                warn!("{} failed on {}: {}", task, host, reason);
                report.failures.push(HostOperationFailure {
                    host,
                    operation: task,
                    reason,
                });
            }
        }
    }
    report
}

/// Reports from one complete run
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabReport {
    pub priming: PhaseReport,
    pub markers: PhaseReport,
    pub teardown: PhaseReport,
}

/// Build `graph` in `engine`, bring it up, hand it to `session`, and tear it
/// down again.
///
/// Teardown runs exactly once whatever happens after a successful build. The
/// first fatal error wins; a teardown error is only returned when nothing
/// failed before it.
pub fn run_lab<E: Emulator, S: Session>(
    graph: TopologyGraph,
    engine: E,
    config: LabConfig,
    session: &mut S,
) -> Result<LabReport, LabError> {
    let mut lab = NetworkOrchestrator::build(graph, engine, config)?;
    let mut report = LabReport::default();

    let outcome = bring_up(&mut lab, &mut report).and_then(|()| session.run(&lab).map_err(LabError::from));
    let stopped = lab.teardown();

    outcome?;
    report.teardown = stopped?;
    Ok(report)
}

fn bring_up<E: Emulator>(lab: &mut NetworkOrchestrator<E>, report: &mut LabReport) -> Result<(), LabError> {
    lab.start()?;
    report.priming = lab.prime_reachability()?;
    report.markers = lab.launch_marker_services()?;
    Ok(())
}
