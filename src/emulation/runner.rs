//! External command execution.
//!
//! Everything the emulation engine does to the kernel or Open vSwitch goes
//! through [`CommandRunner`], so tests can record the command stream instead
//! of touching the host.

use std::process::Command;

use log::debug;

use super::engine::EmulationError;

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful command that printed `stdout`
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// A command that exited with `status` and printed `stderr`
    pub fn failed(status: i32, stderr: &str) -> Self {
        Self {
            success: false,
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// stdout followed by stderr, the way an interactive shell shows them
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Runs programs on the machine hosting the emulation
pub trait CommandRunner: Send + Sync {
    /// Run `program args...`, returning raw output regardless of exit status.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError>;

    /// Run `program args...`, failing if it exits non-zero.
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let output = self.run(program, args)?;
        if !output.success {
            return Err(EmulationError::CommandFailed {
                command: render(program, args),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Render a command line for logs and error messages
pub fn render(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Runs commands with `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        debug!("exec: {}", render(program, args));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| EmulationError::Spawn {
                command: render(program, args),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Returns true if `tool` resolves on PATH
pub fn has_tool<R: CommandRunner + ?Sized>(runner: &R, tool: &str) -> bool {
    runner
        .run("sh", &["-c", &format!("command -v {tool}")])
        .is_ok_and(|o| o.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_captures_output() {
        let out = SystemRunner.run("sh", &["-c", "echo hello; echo oops >&2; exit 3"]).unwrap();
        assert!(!out.success);
        assert_eq!(out.status, Some(3));
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.combined(), "hello\noops\n");
    }

    #[test]
    fn test_run_checked_reports_stderr() {
        let err = SystemRunner
            .run_checked("sh", &["-c", "echo broken >&2; exit 1"])
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("sh -c"), "{text}");
        assert!(text.contains("broken"), "{text}");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = SystemRunner.run("definitely-not-a-real-binary-xyz", &[]).unwrap_err();
        assert!(matches!(err, EmulationError::Spawn { .. }));
    }

    #[test]
    fn test_has_tool() {
        assert!(has_tool(&SystemRunner, "sh"));
        assert!(!has_tool(&SystemRunner, "definitely-not-a-real-binary-xyz"));
    }
}
