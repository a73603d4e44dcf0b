//! Binary path resolution and validation utilities.
//!
//! The launcher copies a responder binary into every host's scratch directory,
//! so the binary has to be located and checked before the network comes up.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Responder binary used when the configuration names none
pub const DEFAULT_RESPONDER: &str = "marker-httpd";

/// Errors that can occur during binary resolution or validation
#[derive(Debug, thiserror::Error)]
pub enum BinaryError {
    #[error("Binary not found: {path}")]
    NotFound { path: String },

    #[error("Binary is not executable: {path}")]
    NotExecutable { path: String },

    #[error("Cannot determine home directory")]
    NoHomeDir,

    #[error("Cannot determine the directory of the running executable")]
    NoExecutableDir,

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },
}

/// Get the user's home directory from the HOME environment variable
fn get_home_dir() -> Result<PathBuf, BinaryError> {
    env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| BinaryError::NoHomeDir)
}

/// Directory holding the running executable
fn executable_dir() -> Result<PathBuf, BinaryError> {
    let exe = env::current_exe().map_err(|_| BinaryError::NoExecutableDir)?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or(BinaryError::NoExecutableDir)
}

/// Resolve a binary path from a shorthand name or explicit path.
///
/// Resolution rules:
/// 1. If path contains `/` or starts with `~`: treat as explicit path
/// 2. Otherwise: the named binary next to the running executable
///
/// ```ignore
/// resolve_binary_path("marker-httpd") -> /path/to/target/release/marker-httpd
/// resolve_binary_path("~/bin/httpd") -> /home/user/bin/httpd
/// resolve_binary_path("/usr/local/bin/httpd") -> /usr/local/bin/httpd
/// ```
pub fn resolve_binary_path(name_or_path: &str) -> Result<PathBuf, BinaryError> {
    if let Some(rest) = name_or_path.strip_prefix('~') {
        let home_dir = get_home_dir()?;
        return Ok(home_dir.join(rest.trim_start_matches('/')));
    }

    if name_or_path.contains('/') {
        Ok(PathBuf::from(name_or_path))
    } else {
        Ok(executable_dir()?.join(name_or_path))
    }
}

/// Validate that a binary exists and is executable.
pub fn validate_binary(path: &Path) -> Result<(), BinaryError> {
    if !path.exists() {
        return Err(BinaryError::NotFound {
            path: path.display().to_string(),
        });
    }

    let metadata = path.metadata().map_err(|_| BinaryError::InvalidPath {
        path: path.display().to_string(),
    })?;

    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return Err(BinaryError::NotExecutable {
            path: path.display().to_string(),
        });
    }

    Ok(())
}

/// Locate the responder binary (configured or default) and check it.
pub fn resolve_responder(configured: Option<&str>) -> Result<PathBuf, BinaryError> {
    let resolved = resolve_binary_path(configured.unwrap_or(DEFAULT_RESPONDER))?;
    validate_binary(&resolved)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_shorthand_next_to_executable() {
        let result = resolve_binary_path("marker-httpd").unwrap();
        let exe = env::current_exe().unwrap();
        assert_eq!(result.parent(), exe.parent());
        assert!(result.ends_with("marker-httpd"));
    }

    #[test]
    fn test_resolve_explicit_tilde() {
        let result = resolve_binary_path("~/bin/marker-httpd").unwrap();
        assert!(result.ends_with("bin/marker-httpd"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn test_resolve_explicit_absolute() {
        let result = resolve_binary_path("/opt/lab/httpd").unwrap();
        assert_eq!(result, PathBuf::from("/opt/lab/httpd"));
    }

    #[test]
    fn test_validate_binary_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responder");

        assert!(matches!(validate_binary(&path), Err(BinaryError::NotFound { .. })));

        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(validate_binary(&path), Err(BinaryError::NotExecutable { .. })));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        validate_binary(&path).unwrap();

        let spec = path.to_str().unwrap();
        assert_eq!(resolve_responder(Some(spec)).unwrap(), path);
    }

    #[test]
    fn test_directory_is_not_a_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(validate_binary(dir.path()), Err(BinaryError::NotExecutable { .. })));
    }
}
