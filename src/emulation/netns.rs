//! Linux emulation engine.
//!
//! Hosts are network namespaces, switches are Open vSwitch bridges, links are
//! veth pairs. Requires root, `ip` (iproute2) and `ovs-vsctl`.

use std::net::Ipv4Addr;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::ip::{HostAddress, LinkPorts, Port};
use crate::topology::NodeKind;

use super::engine::{EmulatedHost, EmulationError, Emulator, SwitchSettings};
use super::runner::{has_tool, CommandOutput, CommandRunner, SystemRunner};

/// Tools the engine shells out to
pub const REQUIRED_TOOLS: [&str; 2] = ["ip", "ovs-vsctl"];

/// A host backed by a network namespace
#[derive(Debug)]
pub struct NetnsHost<R: CommandRunner> {
    address: HostAddress,
    namespace: String,
    interfaces: Vec<String>,
    runner: Arc<R>,
}

impl<R: CommandRunner> NetnsHost<R> {
    /// Every link interface moved into this namespace, in port order
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    fn exec_checked(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let mut full_args = vec!["netns", "exec", &self.namespace, cmd];
        full_args.extend_from_slice(args);
        self.runner.run_checked("ip", &full_args)
    }
}

impl<R: CommandRunner> EmulatedHost for NetnsHost<R> {
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
        self.runner
            .run("ip", &["netns", "exec", &self.namespace, "sh", "-c", command])
    }
}

#[derive(Debug)]
struct SwitchState {
    name: String,
    controller: String,
    ports: Vec<String>,
}

/// Namespace + Open vSwitch emulation engine
#[derive(Debug)]
pub struct NetnsEmulator<R: CommandRunner = SystemRunner> {
    runner: Arc<R>,
    prefix: String,
    hosts: Vec<NetnsHost<R>>,
    switches: Vec<SwitchState>,
    /// Both ends of every veth pair created, whether or not it was attached
    veths: Vec<String>,
    stopped: bool,
}

impl NetnsEmulator<SystemRunner> {
    pub fn new(namespace_prefix: &str) -> Self {
        Self::with_runner(SystemRunner, namespace_prefix)
    }
}

impl<R: CommandRunner> NetnsEmulator<R> {
    pub fn with_runner(runner: R, namespace_prefix: &str) -> Self {
        Self {
            runner: Arc::new(runner),
            prefix: namespace_prefix.to_string(),
            hosts: Vec::new(),
            switches: Vec::new(),
            veths: Vec::new(),
            stopped: false,
        }
    }

    /// Fail early if a required tool is missing
    pub fn preflight(&self) -> Result<(), EmulationError> {
        for tool in REQUIRED_TOOLS {
            if !has_tool(self.runner.as_ref(), tool) {
                return Err(EmulationError::MissingTool(tool.to_string()));
            }
        }
        Ok(())
    }

    fn namespace_for(&self, host: &str) -> String {
        format!("{}{}", self.prefix, host)
    }

    fn host_mut(&mut self, name: &str) -> Result<&mut NetnsHost<R>, EmulationError> {
        self.hosts
            .iter_mut()
            .find(|h| h.address.name == name)
            .ok_or_else(|| EmulationError::UnknownNode(name.to_string()))
    }

    fn switch_mut(&mut self, name: &str) -> Result<&mut SwitchState, EmulationError> {
        self.switches
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| EmulationError::UnknownNode(name.to_string()))
    }

    /// Move one veth end to its owner and configure it
    fn attach(&mut self, port: &Port) -> Result<(), EmulationError> {
        let runner = Arc::clone(&self.runner);
        match port.kind {
            NodeKind::Host => {
                let host = self.host_mut(&port.node)?;
                runner.run_checked("ip", &["link", "set", &port.interface, "netns", &host.namespace])?;
                host.interfaces.push(port.interface.clone());

                if host.address.interface.as_deref() == Some(port.interface.as_str()) {
                    let mac = host.address.mac.to_string();
                    let cidr = host.address.cidr();
                    host.exec_checked("ip", &["link", "set", "dev", &port.interface, "address", &mac])?;
                    host.exec_checked("ip", &["addr", "add", &cidr, "dev", &port.interface])?;
                    debug!("{}: {} {} on {}", port.node, cidr, mac, port.interface);
                }
            }
            NodeKind::Switch => {
                let switch = self.switch_mut(&port.node)?;
                let ofport = format!("ofport_request={}", port.number);
                runner.run_checked(
                    "ovs-vsctl",
                    &[
                        "add-port",
                        &port.node,
                        &port.interface,
                        "--",
                        "set",
                        "Interface",
                        &port.interface,
                        &ofport,
                    ],
                )?;
                switch.ports.push(port.interface.clone());
            }
        }
        Ok(())
    }
}

impl<R: CommandRunner> Emulator for NetnsEmulator<R> {
    type Host = NetnsHost<R>;

    fn add_host(&mut self, address: &HostAddress) -> Result<(), EmulationError> {
        let namespace = self.namespace_for(&address.name);

        // Clean up a stale namespace left by an earlier run
        let _ = self.runner.run("ip", &["netns", "del", &namespace]);
        self.runner.run_checked("ip", &["netns", "add", &namespace])?;

        let host = NetnsHost {
            address: address.clone(),
            namespace,
            interfaces: Vec::new(),
            runner: Arc::clone(&self.runner),
        };
        // Registered before configuring so stop() reclaims it on failure
        self.hosts.push(host);
        let host = &self.hosts[self.hosts.len() - 1];
        host.exec_checked("ip", &["link", "set", "lo", "up"])?;

        debug!("created namespace {} for {}", host.namespace, address.name);
        Ok(())
    }

    fn add_switch(&mut self, name: &str, settings: &SwitchSettings<'_>) -> Result<(), EmulationError> {
        let protocols = format!("protocols={}", settings.protocol);
        let dpid = format!("other-config:datapath-id={}", settings.dpid);

        let _ = self.runner.run("ovs-vsctl", &["--if-exists", "del-br", name]);
        self.switches.push(SwitchState {
            name: name.to_string(),
            controller: settings.controller.target(),
            ports: Vec::new(),
        });
        self.runner.run_checked(
            "ovs-vsctl",
            &[
                "add-br",
                name,
                "--",
                "set",
                "Bridge",
                name,
                &protocols,
                &dpid,
                "--",
                "set-fail-mode",
                name,
                settings.fail_mode.as_str(),
            ],
        )?;

        debug!("created bridge {} (dpid {}, {})", name, settings.dpid, settings.protocol);
        Ok(())
    }

    fn add_link(&mut self, link: &LinkPorts) -> Result<(), EmulationError> {
        // Stale veth from an earlier run (idempotent)
        let _ = self.runner.run("ip", &["link", "del", &link.a.interface]);

        self.runner.run_checked(
            "ip",
            &[
                "link",
                "add",
                &link.a.interface,
                "type",
                "veth",
                "peer",
                "name",
                &link.b.interface,
            ],
        )?;
        self.veths.push(link.a.interface.clone());
        self.veths.push(link.b.interface.clone());

        self.attach(&link.a)?;
        self.attach(&link.b)?;

        debug!("linked {} <-> {}", link.a.interface, link.b.interface);
        Ok(())
    }

    fn start(&mut self) -> Result<(), EmulationError> {
        info!(
            "*** Starting {} switches and {} hosts",
            self.switches.len(),
            self.hosts.len()
        );

        for host in &self.hosts {
            for iface in &host.interfaces {
                host.exec_checked("ip", &["link", "set", iface, "up"])?;
            }
        }

        for switch in &self.switches {
            for iface in &switch.ports {
                self.runner.run_checked("ip", &["link", "set", iface, "up"])?;
            }
            self.runner
                .run_checked("ovs-vsctl", &["set-controller", &switch.name, &switch.controller])?;
        }

        Ok(())
    }

    fn stop(&mut self) -> Result<(), EmulationError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("*** Stopping network");

        let mut first_error = None;

        for switch in &self.switches {
            if let Err(e) = self.runner.run_checked("ovs-vsctl", &["--if-exists", "del-br", &switch.name]) {
                warn!("Failed to delete bridge {}: {}", switch.name, e);
                first_error.get_or_insert(e);
            }
        }

        // Ends still in the root namespace: switch ports after del-br, and
        // pairs whose attach failed. Ends already moved are gone with their
        // namespace, so "not found" is expected here.
        for iface in &self.veths {
            let _ = self.runner.run("ip", &["link", "del", iface]);
        }

        for host in &self.hosts {
            if let Err(e) = self.runner.run_checked("ip", &["netns", "del", &host.namespace]) {
                warn!("Failed to delete namespace {}: {}", host.namespace, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn hosts(&self) -> &[Self::Host] {
        &self.hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AddressingConfig, LabConfig};
    use crate::emulation::runner::render;
    use crate::ip::AddressPlan;
    use crate::topology::generators;
    use std::sync::Mutex;

    /// Records every command and fails the ones containing `fail_on`
    #[derive(Default)]
    struct RecordingRunner {
        log: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingRunner {
        fn failing_on(pattern: &str) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                fail_on: Some(pattern.to_string()),
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
            let line = render(program, args);
            self.log.lock().unwrap().push(line.clone());
            match &self.fail_on {
                Some(pattern) if line.contains(pattern.as_str()) => {
                    Ok(CommandOutput::failed(2, "Operation not permitted"))
                }
                _ => Ok(CommandOutput::ok("")),
            }
        }
    }

    fn commands(engine: &NetnsEmulator<RecordingRunner>) -> Vec<String> {
        engine.runner.log.lock().unwrap().clone()
    }

    fn build(engine: &mut NetnsEmulator<RecordingRunner>, plan: &AddressPlan) -> Result<(), EmulationError> {
        let config = LabConfig::default();
        for host in &plan.hosts {
            engine.add_host(host)?;
        }
        for switch in &plan.switches {
            let settings = SwitchSettings {
                dpid: switch.dpid,
                protocol: &config.switch.protocol,
                fail_mode: config.switch.fail_mode,
                controller: &config.controller,
            };
            engine.add_switch(&switch.name, &settings)?;
        }
        for link in &plan.links {
            engine.add_link(link)?;
        }
        Ok(())
    }

    #[test]
    fn test_single_host_command_stream() {
        let graph = generators::single(1).unwrap();
        let plan = AddressPlan::build(&graph, &AddressingConfig::default()).unwrap();
        let mut engine = NetnsEmulator::with_runner(RecordingRunner::default(), "lab-");

        build(&mut engine, &plan).unwrap();
        engine.start().unwrap();

        let log = commands(&engine);
        let expected = [
            "ip netns add lab-h1",
            "ip netns exec lab-h1 ip link set lo up",
            "ovs-vsctl add-br s1 -- set Bridge s1 protocols=OpenFlow13 other-config:datapath-id=0000000000000001 -- set-fail-mode s1 secure",
            "ip link add h1-eth0 type veth peer name s1-eth1",
            "ip link set h1-eth0 netns lab-h1",
            "ip netns exec lab-h1 ip link set dev h1-eth0 address 00:00:00:00:00:01",
            "ip netns exec lab-h1 ip addr add 10.0.0.1/8 dev h1-eth0",
            "ovs-vsctl add-port s1 s1-eth1 -- set Interface s1-eth1 ofport_request=1",
            "ip netns exec lab-h1 ip link set h1-eth0 up",
            "ip link set s1-eth1 up",
            "ovs-vsctl set-controller s1 tcp:127.0.0.1:6653",
        ];
        for cmd in expected {
            assert!(log.iter().any(|l| l == cmd), "missing command: {cmd}\n{log:#?}");
        }

        // Ordering: the veth exists before either end is moved
        let pos = |needle: &str| log.iter().position(|l| l == needle).unwrap();
        assert!(pos("ip link add h1-eth0 type veth peer name s1-eth1") < pos("ip link set h1-eth0 netns lab-h1"));
        assert!(pos("ip link set s1-eth1 up") < pos("ovs-vsctl set-controller s1 tcp:127.0.0.1:6653"));

        let host = engine.host("h1").unwrap();
        assert_eq!(host.primary_interface(), Some("h1-eth0"));
        assert_eq!(host.primary_address(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(host.interfaces(), ["h1-eth0".to_string()]);
    }

    #[test]
    fn test_run_command_executes_in_namespace() {
        let graph = generators::single(1).unwrap();
        let plan = AddressPlan::build(&graph, &AddressingConfig::default()).unwrap();
        let mut engine = NetnsEmulator::with_runner(RecordingRunner::default(), "");
        build(&mut engine, &plan).unwrap();

        engine.hosts()[0].run_command("hostname").unwrap();
        let log = commands(&engine);
        assert_eq!(log.last().unwrap(), "ip netns exec h1 sh -c hostname");
    }

    #[test]
    fn test_stop_reclaims_everything_once() {
        let graph = generators::single(2).unwrap();
        let plan = AddressPlan::build(&graph, &AddressingConfig::default()).unwrap();
        let mut engine = NetnsEmulator::with_runner(RecordingRunner::default(), "");
        build(&mut engine, &plan).unwrap();

        engine.stop().unwrap();
        let after_first = commands(&engine).len();
        engine.stop().unwrap();
        assert_eq!(commands(&engine).len(), after_first, "second stop must be a no-op");

        let log = commands(&engine);
        assert!(log.iter().any(|l| l == "ovs-vsctl --if-exists del-br s1"));
        assert!(log.iter().any(|l| l == "ip link del s1-eth2"));
        assert!(log.iter().any(|l| l == "ip netns del h1"));
        assert!(log.iter().any(|l| l == "ip netns del h2"));
    }

    #[test]
    fn test_failed_build_still_tracks_partial_resources() {
        let graph = generators::single(2).unwrap();
        let plan = AddressPlan::build(&graph, &AddressingConfig::default()).unwrap();
        let mut engine = NetnsEmulator::with_runner(RecordingRunner::failing_on("add-br"), "");

        let err = build(&mut engine, &plan).unwrap_err();
        assert!(matches!(err, EmulationError::CommandFailed { .. }));

        engine.stop().unwrap();
        let log = commands(&engine);
        assert!(log.iter().any(|l| l == "ip netns del h1"));
        assert!(log.iter().any(|l| l == "ip netns del h2"));
        assert!(log.iter().any(|l| l == "ovs-vsctl --if-exists del-br s1"));
    }

    #[test]
    fn test_failed_attach_still_removes_veth_pair() {
        let graph = generators::single(1).unwrap();
        let plan = AddressPlan::build(&graph, &AddressingConfig::default()).unwrap();
        let mut engine = NetnsEmulator::with_runner(RecordingRunner::failing_on("set h1-eth0 netns"), "");

        let err = build(&mut engine, &plan).unwrap_err();
        assert!(matches!(err, EmulationError::CommandFailed { .. }));
        engine.stop().unwrap();

        let log = commands(&engine);
        let created = log
            .iter()
            .position(|l| l == "ip link add h1-eth0 type veth peer name s1-eth1")
            .unwrap();
        let removed = log.iter().rposition(|l| l == "ip link del h1-eth0").unwrap();
        assert!(removed > created, "veth pair left behind:\n{log:#?}");
        assert!(log[created..].iter().any(|l| l == "ip link del s1-eth1"));
        assert!(log.iter().any(|l| l == "ip netns del h1"));
    }

    #[test]
    fn test_preflight_reports_missing_tool() {
        let engine = NetnsEmulator::with_runner(RecordingRunner::failing_on("ovs-vsctl"), "");
        let err = engine.preflight().unwrap_err();
        assert!(matches!(err, EmulationError::MissingTool(tool) if tool == "ovs-vsctl"));
    }
}
