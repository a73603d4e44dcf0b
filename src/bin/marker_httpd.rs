//! Marker responder binary.
//!
//! Copied into each host's scratch directory by `sdnlab` and started inside
//! the host. Serves the directory over HTTP and logs the client IP of every
//! request.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;

use sdnlab::responder;

#[derive(Parser)]
#[command(name = "marker-httpd")]
#[command(about = "Serve a directory over HTTP, logging client addresses")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = 80)]
    port: u16,

    /// Directory to serve
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Address to bind
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let root = args
        .root
        .canonicalize()
        .wrap_err_with(|| format!("Cannot serve '{}'", args.root.display()))?;

    responder::serve(args.bind, args.port, &root)
        .await
        .wrap_err_with(|| format!("Responder on port {} failed", args.port))?;

    Ok(())
}
