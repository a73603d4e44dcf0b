//! Marker service launcher.
//!
//! Every host gets a small HTTP responder serving a page that names the host,
//! so an operator can tell which host answered a request once the controller
//! starts steering traffic. Launches are best-effort: a host whose responder
//! fails to start is reported and skipped.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::config::MarkerConfig;
use crate::emulation::{EmulatedHost, EmulationError};
use crate::utils::binary::{resolve_responder, BinaryError, DEFAULT_RESPONDER};

/// Page served at `/`
pub const INDEX_FILE: &str = "index.html";
/// Responder stdout/stderr, inside the scratch directory
pub const LOG_FILE: &str = "marker.log";

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("failed to prepare {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EmulationError),

    #[error("'{command}' failed on {host}: {detail}")]
    Command {
        host: String,
        command: String,
        detail: String,
    },

    #[error("responder on {host} did not report a pid (got '{output}')")]
    NoPid { host: String, output: String },
}

/// A running marker responder. Teardown stops it through this handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerHandle {
    pub host: String,
    pub pid: u32,
    pub port: u16,
    pub workdir: PathBuf,
}

impl MarkerHandle {
    pub fn stop_command(&self) -> String {
        format!("kill -9 {}", self.pid)
    }

    /// Kill the responder inside its host
    pub fn stop<H: EmulatedHost + ?Sized>(&self, host: &H) -> Result<(), MarkerError> {
        let command = self.stop_command();
        let output = host.run_command(&command)?;
        if !output.success {
            return Err(MarkerError::Command {
                host: self.host.clone(),
                command,
                detail: output.combined().trim().to_string(),
            });
        }
        debug!("stopped marker on {} (pid {})", self.host, self.pid);
        Ok(())
    }
}

/// Prepares scratch directories and starts responders inside hosts
#[derive(Debug, Clone)]
pub struct MarkerLauncher {
    responder: PathBuf,
    scratch_root: PathBuf,
    port: u16,
}

impl MarkerLauncher {
    pub fn new(responder: PathBuf, scratch_root: PathBuf, port: u16) -> Self {
        Self {
            responder,
            scratch_root,
            port,
        }
    }

    /// Locate and validate the responder named by the configuration
    pub fn from_config(config: &MarkerConfig) -> Result<Self, BinaryError> {
        let responder = resolve_responder(config.responder.as_deref())?;
        Ok(Self::new(responder, config.scratch_root.clone(), config.port))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Scratch directory for `host`
    pub fn workdir(&self, host: &str) -> PathBuf {
        self.scratch_root.join(host)
    }

    fn binary_name(&self) -> String {
        self.responder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_RESPONDER.to_string())
    }

    /// Create the scratch directory, copy the responder and write the page.
    ///
    /// Scratch files left by a previous run are overwritten, never removed.
    pub fn prepare(&self, host: &str) -> Result<PathBuf, MarkerError> {
        let workdir = self.workdir(host);
        let scratch = |path: &Path| {
            let path = path.to_path_buf();
            move |source| MarkerError::Scratch { path, source }
        };

        fs::create_dir_all(&workdir).map_err(scratch(&workdir))?;

        // Copy then rename, so a responder still running from an earlier run
        // does not make the copy fail with "text file busy"
        let target = workdir.join(self.binary_name());
        let staging = workdir.join(format!(".{}.tmp", self.binary_name()));
        fs::copy(&self.responder, &staging).map_err(scratch(&staging))?;
        fs::set_permissions(&staging, fs::Permissions::from_mode(0o755)).map_err(scratch(&staging))?;
        fs::rename(&staging, &target).map_err(scratch(&target))?;

        let index = workdir.join(INDEX_FILE);
        fs::write(&index, format!("WEB PAGE SERVED BY: {host}\n")).map_err(scratch(&index))?;

        Ok(workdir)
    }

    /// Shell line that starts the responder in the background and prints its pid
    pub fn launch_command(&self, workdir: &Path) -> String {
        format!(
            "cd {} || exit 1; nohup ./{} --port {} --root . > {} 2>&1 & echo $!",
            shell_quote(&workdir.to_string_lossy()),
            shell_quote(&self.binary_name()),
            self.port,
            LOG_FILE
        )
    }

    /// Start the responder inside `host`.
    ///
    /// # Arguments
    /// * `host` - Host to run the responder in; its name selects the scratch directory
    ///
    /// # Returns
    /// The handle needed to stop the responder again
    pub fn launch<H: EmulatedHost + ?Sized>(&self, host: &H) -> Result<MarkerHandle, MarkerError> {
        info!("*** Starting marker service on {}", host.name());

        let workdir = self.prepare(host.name())?;
        let command = self.launch_command(&workdir);
        let output = host.run_command(&command)?;

        if !output.success {
            return Err(MarkerError::Command {
                host: host.name().to_string(),
                command,
                detail: output.combined().trim().to_string(),
            });
        }

        let pid = output
            .stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| line.trim().parse::<u32>().ok())
            .ok_or_else(|| MarkerError::NoPid {
                host: host.name().to_string(),
                output: output.stdout.trim().to_string(),
            })?;

        debug!("marker on {} running as pid {}", host.name(), pid);
        Ok(MarkerHandle {
            host: host.name().to_string(),
            pid,
            port: self.port,
            workdir,
        })
    }
}

/// Single-quote `s` for `sh`
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
