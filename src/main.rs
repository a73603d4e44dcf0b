use clap::error::ErrorKind;
use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process;

use sdnlab::config_loader;
use sdnlab::emulation::{CommandRunner, NetnsEmulator, SystemRunner};
use sdnlab::error::PhaseReport;
use sdnlab::ip::AddressPlan;
use sdnlab::orchestrator::{run_lab, LabReport};
use sdnlab::session::{ConsoleSession, NoSession};
use sdnlab::topology::{usage, TopologyGraph, TopologySpec};

/// Launch an emulated SDN test network against a remote OpenFlow controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology: single,N | tree,N | linear,N | assign1 | triangle | mesh,N | someloops
    topology: Option<String>,

    /// Path to the lab configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the topology and address plan as JSON and exit
    #[arg(long)]
    dump: bool,

    /// Bring the network up and tear it down again without a console
    #[arg(long)]
    no_cli: bool,

    /// Write the per-phase host report as JSON when the run ends
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct Dump<'a> {
    topology: String,
    graph: &'a TopologyGraph,
    plan: &'a AddressPlan,
}

/// Help and version requests are not usage errors
fn is_usage_error(err: &clap::Error) -> bool {
    !matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

/// Parse the command line; any malformed invocation exits with status 1
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !is_usage_error(&e) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{}", usage());
            process::exit(1);
        }
    }
}

/// Validate the positional argument; the error is the text to print
fn parse_spec(arg: Option<&str>) -> Result<TopologySpec, String> {
    match arg {
        None => Err(usage()),
        Some(text) => text.parse().map_err(|e| format!("{e}\n{}", usage())),
    }
}

fn log_report(phase: &str, report: &PhaseReport) {
    if report.is_clean() {
        info!("{}: {} of {} hosts ok", phase, report.succeeded(), report.attempted);
    } else {
        warn!(
            "{}: {} of {} hosts ok, failed on {}",
            phase,
            report.succeeded(),
            report.attempted,
            report.failed_hosts().collect::<Vec<_>>().join(", ")
        );
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = parse_args();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let spec = match parse_spec(args.topology.as_deref()) {
        Ok(spec) => spec,
        Err(message) => {
            eprintln!("{message}");
            process::exit(1);
        }
    };

    let config = config_loader::load_or_default(args.config.as_deref())?;
    let graph = spec
        .build()
        .wrap_err_with(|| format!("Failed to build topology '{spec}'"))?;

    if args.dump {
        let plan = AddressPlan::build(&graph, &config.addressing)
            .wrap_err("Failed to assign addresses")?;
        let dump = Dump {
            topology: spec.to_string(),
            graph: &graph,
            plan: &plan,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    match SystemRunner.run("id", &["-u"]) {
        Ok(out) if out.stdout.trim() == "0" => {}
        _ => warn!("Not running as root; creating namespaces and bridges will likely fail"),
    }

    let engine = NetnsEmulator::new(&config.engine.namespace_prefix);
    engine
        .preflight()
        .wrap_err("Emulation tools missing (are iproute2 and Open vSwitch installed?)")?;

    info!("Controller: {}", config.controller.target());
    let report: LabReport = if args.no_cli {
        run_lab(graph, engine, config, &mut NoSession)
    } else {
        run_lab(graph, engine, config, &mut ConsoleSession::stdio())
    }
    .wrap_err_with(|| format!("Lab run for '{spec}' failed"))?;

    log_report("ARP priming", &report.priming);
    log_report("Marker services", &report.markers);
    if !report.teardown.is_clean() {
        log_report("Marker shutdown", &report.teardown);
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .wrap_err_with(|| format!("Failed to write report '{}'", path.display()))?;
        info!("Run report written to {:?}", path);
    }

    Ok(())
}
