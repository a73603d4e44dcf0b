//! Interactive operator console.
//!
//! Runs while the network is up. The operator inspects the network and runs
//! commands inside hosts; `exit`, `quit` or end of input ends the session and
//! lets teardown proceed.

use std::io::{self, BufRead, Write};
use std::thread;

use log::{debug, warn};

use crate::emulation::{EmulatedHost, Emulator};
use crate::orchestrator::NetworkOrchestrator;
use crate::topology::NodeKind;

const PROMPT: &str = "sdnlab> ";

const HELP: &str = "\
Documented commands:
  help              show this message
  nodes             list nodes
  net               list links per node
  dump              show host and switch addresses
  <host> <cmd...>   run a shell command inside a host
  exit, quit        stop the network and exit (Ctrl-D also works)
";

/// Something that occupies the running network until the operator is done
pub trait Session {
    fn run<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>) -> io::Result<()>;
}

/// Returns immediately; the network is torn down right after bring-up
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

impl Session for NoSession {
    fn run<E: Emulator>(&mut self, _lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        Ok(())
    }
}

/// Line-oriented console over any reader/writer pair
pub struct ConsoleSession<R, W> {
    input: R,
    output: W,
    prompt: bool,
}

impl ConsoleSession<io::StdinLock<'static>, io::Stdout> {
    /// Console on the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout()).with_prompt(true)
    }
}

impl<R: BufRead, W: Write> ConsoleSession<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            prompt: false,
        }
    }

    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Handle one input line. Returns false when the session should end.
    fn dispatch<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>, line: &str) -> io::Result<bool> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word {
            "" => {}
            "exit" | "quit" => return Ok(false),
            "help" | "?" => self.output.write_all(HELP.as_bytes())?,
            "nodes" => self.nodes(lab)?,
            "net" => self.net(lab)?,
            "dump" => self.dump(lab)?,
            name if lab.graph().contains(name) => self.host_command(lab, name, rest)?,
            _ => writeln!(self.output, "*** Unknown command: {line}\n(type 'help' for a list)")?,
        }
        Ok(true)
    }

    fn nodes<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        let names: Vec<&str> = lab.graph().nodes().iter().map(|n| n.name.as_str()).collect();
        writeln!(self.output, "available nodes are:\n{}", names.join(" "))
    }

    fn net<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        for node in lab.graph().nodes() {
            let mut line = node.name.clone();
            for link in &lab.plan().links {
                let pair = if link.a.node == node.name {
                    Some((&link.a, &link.b))
                } else if link.b.node == node.name {
                    Some((&link.b, &link.a))
                } else {
                    None
                };
                if let Some((own, peer)) = pair {
                    line.push_str(&format!(" {}:{}", own.interface, peer.interface));
                }
            }
            writeln!(self.output, "{line}")?;
        }
        Ok(())
    }

    fn dump<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        let plan = lab.plan();
        for node in lab.graph().nodes() {
            match node.kind {
                NodeKind::Host => {
                    if let Some(host) = plan.host(&node.name) {
                        writeln!(
                            self.output,
                            "<Host {}: {}:{} mac={}>",
                            host.name,
                            host.interface.as_deref().unwrap_or("-"),
                            host.ip,
                            host.mac
                        )?;
                    }
                }
                NodeKind::Switch => {
                    if let Some(switch) = plan.switch(&node.name) {
                        writeln!(self.output, "<Switch {}: dpid={}>", switch.name, switch.dpid)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn host_command<E: Emulator>(
        &mut self,
        lab: &NetworkOrchestrator<E>,
        name: &str,
        command: &str,
    ) -> io::Result<()> {
        let Some(host) = lab.engine().host(name) else {
            return writeln!(self.output, "*** {name} is a switch; commands run inside hosts only");
        };
        if command.is_empty() {
            return writeln!(self.output, "*** Enter a command for node: {name} <cmd>");
        }

        debug!("{}: {}", name, command);
        match host.run_command(command) {
            Ok(output) => {
                self.output.write_all(output.combined().as_bytes())?;
                if let (false, Some(code)) = (output.success, output.status) {
                    writeln!(self.output, "*** exit status {code}")?;
                }
            }
            Err(e) => writeln!(self.output, "*** {e}")?,
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Session for ConsoleSession<R, W> {
    fn run<E: Emulator>(&mut self, lab: &NetworkOrchestrator<E>) -> io::Result<()> {
        let _guard = InterruptGuard::install();

        let mut line = String::new();
        loop {
            if self.prompt {
                write!(self.output, "{PROMPT}")?;
            }
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                if self.prompt {
                    writeln!(self.output)?;
                }
                return Ok(());
            }
            if !self.dispatch(lab, &line)? {
                return Ok(());
            }
        }
    }
}

/// Keeps Ctrl-C from killing the launcher while the console runs.
///
/// A foreground host command still receives the interrupt and stops. Once
/// installed, the process-wide SIGINT handler stays in place, so teardown
/// cannot be cut short by a second Ctrl-C either.
pub struct InterruptGuard {
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl InterruptGuard {
    /// Start capturing SIGINT on a helper thread. Returns `None` (logged) if
    /// the signal runtime cannot be created.
    pub fn install() -> Option<Self> {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_io().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot capture Ctrl-C: {}", e);
                return None;
            }
        };

        let (shutdown, mut stop) = tokio::sync::oneshot::channel::<()>();
        let handle = thread::Builder::new()
            .name("sigint".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            _ = &mut stop => break,
                            result = tokio::signal::ctrl_c() => match result {
                                Ok(()) => warn!("Interrupt (type 'exit' or press Ctrl-D to stop the network)"),
                                Err(e) => {
                                    warn!("Cannot capture Ctrl-C: {}", e);
                                    break;
                                }
                            },
                        }
                    }
                });
            });

        match handle {
            Ok(handle) => Some(Self {
                shutdown: Some(shutdown),
                handle: Some(handle),
            }),
            Err(e) => {
                warn!("Cannot capture Ctrl-C: {}", e);
                None
            }
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
