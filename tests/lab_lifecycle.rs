//! End-to-end lifecycle of a lab against a recording engine: ordering,
//! per-host failure isolation, and teardown guarantees.

use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use sdnlab::config::LabConfig;
use sdnlab::emulation::{CommandOutput, EmulatedHost, EmulationError, Emulator, SwitchSettings};
use sdnlab::error::{LabError, Phase};
use sdnlab::ip::{HostAddress, LinkPorts};
use sdnlab::orchestrator::{run_lab, NetworkOrchestrator};
use sdnlab::process::{HostTask, MarkerLauncher};
use sdnlab::session::{NoSession, Session};
use sdnlab::topology::{generators, TopologyGraph};

type Journal = Arc<Mutex<Vec<String>>>;

struct RecordingHost {
    address: HostAddress,
    journal: Journal,
    broken: bool,
}

impl EmulatedHost for RecordingHost {
    fn name(&self) -> &str {
        &self.address.name
    }

    fn primary_interface(&self) -> Option<&str> {
        self.address.interface.as_deref()
    }

    fn primary_address(&self) -> Ipv4Addr {
        self.address.ip
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput, EmulationError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}: {}", self.address.name, command));

        if self.broken {
            return Ok(CommandOutput::failed(1, "network is unreachable"));
        }
        if command.contains("nohup") {
            let pid = 1000 + u32::from(self.address.ip.octets()[3]);
            return Ok(CommandOutput::ok(&format!("{pid}\n")));
        }
        Ok(CommandOutput::ok(""))
    }
}

#[derive(Default)]
struct RecordingEngine {
    hosts: Vec<RecordingHost>,
    journal: Journal,
    broken_host: Option<&'static str>,
    refuse_start: bool,
}

impl RecordingEngine {
    fn with_broken_host(name: &'static str) -> Self {
        Self {
            broken_host: Some(name),
            ..Default::default()
        }
    }

    fn log(&self, entry: &str) {
        self.journal.lock().unwrap().push(entry.to_string());
    }
}

impl Emulator for RecordingEngine {
    type Host = RecordingHost;

    fn add_host(&mut self, address: &HostAddress) -> Result<(), EmulationError> {
        self.log(&format!("add_host {}", address.name));
        self.hosts.push(RecordingHost {
            address: address.clone(),
            journal: Arc::clone(&self.journal),
            broken: self.broken_host == Some(address.name.as_str()),
        });
        Ok(())
    }

    fn add_switch(&mut self, name: &str, settings: &SwitchSettings<'_>) -> Result<(), EmulationError> {
        self.log(&format!("add_switch {} dpid={} {}", name, settings.dpid, settings.controller.target()));
        Ok(())
    }

    fn add_link(&mut self, link: &LinkPorts) -> Result<(), EmulationError> {
        self.log(&format!("add_link {}-{}", link.a.node, link.b.node));
        Ok(())
    }

    fn start(&mut self) -> Result<(), EmulationError> {
        self.log("start");
        if self.refuse_start {
            return Err(EmulationError::Engine("controller unreachable".to_string()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EmulationError> {
        self.log("stop");
        Ok(())
    }

    fn hosts(&self) -> &[RecordingHost] {
        &self.hosts
    }
}

fn fake_responder(dir: &Path) -> String {
    let path = dir.join("marker-httpd");
    fs::write(&path, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn lab_config(dir: &Path) -> LabConfig {
    let mut config = LabConfig::default();
    config.marker.responder = Some(fake_responder(dir));
    config.marker.scratch_root = dir.join("scratch");
    config
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("missing '{entry}' in {log:#?}"))
}

struct FailingSession;

impl Session for FailingSession {
    fn run<E: Emulator>(&mut self, _lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "console went away"))
    }
}

struct PanickingSession;

impl Session for PanickingSession {
    fn run<E: Emulator>(&mut self, _lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        panic!("operator console crashed");
    }
}

fn single(k: usize) -> TopologyGraph {
    generators::single(k).unwrap()
}

#[test]
fn test_full_run_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine::default();
    let journal = Arc::clone(&engine.journal);

    let report = run_lab(single(2), engine, lab_config(dir.path()), &mut NoSession).unwrap();
    assert!(report.priming.is_clean());
    assert_eq!(report.markers.succeeded(), 2);
    assert!(report.teardown.is_clean());

    let log = entries(&journal);
    let build = position(&log, "add_link h2-s1");
    let start = position(&log, "start");
    let arp = position(&log, "h1: arping -c 2 -A -I h1-eth0 10.0.0.1");
    let kill = position(&log, "h2: kill -9 1002");
    let stop = position(&log, "stop");
    assert!(build < start && start < arp && arp < kill && kill < stop, "{log:#?}");
    assert_eq!(log.iter().filter(|e| *e == "stop").count(), 1);
    assert!(log.contains(&"add_switch s1 dpid=0000000000000001 tcp:127.0.0.1:6653".to_string()));

    let page = fs::read_to_string(dir.path().join("scratch/h2/index.html")).unwrap();
    assert_eq!(page, "WEB PAGE SERVED BY: h2\n");
}

#[test]
fn test_failing_host_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine::with_broken_host("h2");
    let journal = Arc::clone(&engine.journal);

    let mut lab = NetworkOrchestrator::build(single(3), engine, lab_config(dir.path())).unwrap();
    lab.start().unwrap();

    let priming = lab.prime_reachability().unwrap();
    assert_eq!(priming.attempted, 3);
    assert_eq!(priming.failures.len(), 1);
    assert_eq!(priming.failures[0].host, "h2");
    assert_eq!(priming.failures[0].operation, HostTask::Prime);
    assert!(priming.failures[0].reason.contains("network is unreachable"));

    let markers = lab.launch_marker_services().unwrap();
    assert_eq!(markers.failed_hosts().collect::<Vec<_>>(), ["h2"]);
    assert_eq!(lab.phase(), Phase::Running);

    let running: Vec<_> = lab.markers().iter().map(|m| m.host.as_str()).collect();
    assert_eq!(running, ["h1", "h3"]);

    let log = entries(&journal);
    assert!(log.contains(&"h3: arping -c 2 -A -I h3-eth0 10.0.0.3".to_string()));

    lab.teardown().unwrap();
    let log = entries(&journal);
    assert!(log.contains(&"h1: kill -9 1001".to_string()));
    assert!(log.contains(&"h3: kill -9 1003".to_string()));
    assert!(!log.iter().any(|e| e.starts_with("h2: kill")));
}

#[test]
fn test_markers_stopped_before_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine::default();
    let journal = Arc::clone(&engine.journal);

    let config = lab_config(dir.path());
    let launcher = MarkerLauncher::from_config(&config.marker).unwrap();
    let mut lab = NetworkOrchestrator::build(single(2), engine, config).unwrap();
    lab.start().unwrap();
    lab.prime_reachability().unwrap();
    lab.launch_marker_services_with(&launcher).unwrap();
    assert_eq!(lab.markers().len(), 2);

    drop(lab);

    let log = entries(&journal);
    let stop = position(&log, "stop");
    assert!(position(&log, "h1: kill -9 1001") < stop);
    assert!(position(&log, "h2: kill -9 1002") < stop);
}

#[test]
fn test_session_failure_still_tears_down_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine::default();
    let journal = Arc::clone(&engine.journal);

    let err = run_lab(single(1), engine, lab_config(dir.path()), &mut FailingSession).unwrap_err();
    assert!(matches!(err, LabError::Session(_)));

    let log = entries(&journal);
    assert_eq!(log.iter().filter(|e| *e == "stop").count(), 1);
    assert!(position(&log, "h1: kill -9 1001") < position(&log, "stop"));
}

#[test]
fn test_panicking_session_still_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine::default();
    let journal = Arc::clone(&engine.journal);
    let config = lab_config(dir.path());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        run_lab(single(1), engine, config, &mut PanickingSession)
    }));
    assert!(result.is_err());

    let log = entries(&journal);
    assert_eq!(log.iter().filter(|e| *e == "stop").count(), 1);
}

#[test]
fn test_missing_responder_fails_every_host_but_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LabConfig::default();
    config.marker.responder = Some(dir.path().join("absent").to_string_lossy().into_owned());
    config.marker.scratch_root = dir.path().to_path_buf();

    let report = run_lab(single(2), RecordingEngine::default(), config, &mut NoSession).unwrap();
    assert_eq!(report.markers.attempted, 2);
    assert_eq!(report.markers.failures.len(), 2);
    assert!(report.markers.failures[0].reason.contains("not found"));
}

#[test]
fn test_disabled_markers_skip_launch() {
    let engine = RecordingEngine::default();
    let journal = Arc::clone(&engine.journal);
    let mut config = LabConfig::default();
    config.marker.enabled = false;

    let report = run_lab(single(2), engine, config, &mut NoSession).unwrap();
    assert_eq!(report.markers.attempted, 0);
    assert!(!entries(&journal).iter().any(|e| e.contains("nohup")));
}

#[test]
fn test_engine_start_failure_tears_down_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RecordingEngine {
        refuse_start: true,
        ..Default::default()
    };
    let journal = Arc::clone(&engine.journal);

    let err = run_lab(single(2), engine, lab_config(dir.path()), &mut NoSession).unwrap_err();
    assert!(matches!(err, LabError::EmulationEngine(EmulationError::Engine(_))));

    let log = entries(&journal);
    assert_eq!(log.iter().filter(|e| *e == "stop").count(), 1);
    assert!(position(&log, "start") < position(&log, "stop"));
    assert!(!log.iter().any(|e| e.contains("arping") || e.contains("nohup")), "{log:#?}");
}
