//! Gratuitous ARP priming.
//!
//! A freshly started network has empty ARP caches and a controller that has
//! not yet seen any host. Each host announces itself with unsolicited ARP
//! replies so the controller learns every location before traffic flows.

use log::{debug, info};

use crate::emulation::EmulatedHost;

/// Build the `arping` command that announces `host` on its primary interface.
///
/// Returns `None` when the host has no interface to announce on.
pub fn arping_command<H: EmulatedHost + ?Sized>(host: &H, count: u32) -> Option<String> {
    let iface = host.primary_interface()?;
    Some(format!(
        "arping -c {} -A -I {} {}",
        count,
        iface,
        host.primary_address()
    ))
}

/// Send `count` gratuitous ARPs from `host`.
///
/// The error string is the reason reported for this host; nothing is retried.
pub fn prime_host<H: EmulatedHost + ?Sized>(host: &H, count: u32) -> Result<(), String> {
    info!("*** ARPing from host {}", host.name());

    let command = arping_command(host, count)
        .ok_or_else(|| format!("{} has no link, nothing to announce", host.name()))?;

    let output = host.run_command(&command).map_err(|e| e.to_string())?;
    if !output.success {
        let detail = output.combined();
        let detail = detail.trim();
        return Err(match output.status {
            Some(code) if detail.is_empty() => format!("'{command}' exited with status {code}"),
            Some(code) => format!("'{command}' exited with status {code}: {detail}"),
            None => format!("'{command}' was terminated by a signal"),
        });
    }

    debug!("{}: {}", host.name(), output.stdout.trim());
    Ok(())
}
