//! Endpoint discovery for the companion process.
//!
//! # Platform Behavior
//! - **Linux/macOS**: `<tmp>/discord-ipc-0` .. `<tmp>/discord-ipc-9`, where
//!   `<tmp>` is the first of `XDG_RUNTIME_DIR`, `TMPDIR`, `TMP`, `TEMP` that is
//!   set, else `/tmp`. Snap and flatpak clients put their sockets one level
//!   deeper; those directories are appended when present.
//! - **Windows**: `\\?\pipe\discord-ipc-0` .. `\\?\pipe\discord-ipc-9`

use crate::config::TransportConfig;
use std::path::{Path, PathBuf};

/// The temp directory the companion places its sockets in.
pub fn ipc_temp_dir() -> PathBuf {
    temp_dir_from(|name| std::env::var_os(name))
}

fn temp_dir_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<std::ffi::OsString>,
{
    TransportConfig::TEMP_DIR_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(TransportConfig::FALLBACK_TEMP_DIR))
}

/// The numbered endpoint names inside one directory.
pub fn numbered_endpoints(dir: &Path) -> Vec<PathBuf> {
    (0..TransportConfig::ENDPOINT_CANDIDATES)
        .map(|i| dir.join(format!("{}{}", TransportConfig::ENDPOINT_PREFIX, i)))
        .collect()
}

/// Every socket path worth trying, in order.
pub fn ipc_socket_candidates() -> Vec<PathBuf> {
    socket_candidates_in(&ipc_temp_dir())
}

/// Socket candidates under `temp_dir`: the plain numbered endpoints, then
/// those of any non-empty sandbox directory.
pub fn socket_candidates_in(temp_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = numbered_endpoints(temp_dir);

    for sandbox in TransportConfig::SANDBOX_DIRS {
        let dir = temp_dir.join(sandbox);
        if is_non_empty_dir(&dir) {
            candidates.extend(numbered_endpoints(&dir));
        }
    }

    candidates
}

fn is_non_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Named pipe paths, in order.
pub fn ipc_pipe_candidates() -> Vec<String> {
    (0..TransportConfig::ENDPOINT_CANDIDATES)
        .map(|i| {
            format!(
                "{}{}{}",
                TransportConfig::PIPE_PREFIX,
                TransportConfig::ENDPOINT_PREFIX,
                i
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_temp_dir_precedence() {
        let dir = temp_dir_from(|name| match name {
            "TMPDIR" => Some(OsString::from("/var/tmp/a")),
            "TEMP" => Some(OsString::from("/var/tmp/b")),
            _ => None,
        });
        assert_eq!(dir, PathBuf::from("/var/tmp/a"));

        let dir = temp_dir_from(|name| match name {
            "XDG_RUNTIME_DIR" => Some(OsString::new()),
            "TMP" => Some(OsString::from("/run/tmp")),
            _ => None,
        });
        assert_eq!(dir, PathBuf::from("/run/tmp"));
    }

    #[test]
    fn test_temp_dir_fallback() {
        assert_eq!(temp_dir_from(|_| None), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_numbered_endpoints() {
        let endpoints = numbered_endpoints(Path::new("/run/user/1000"));
        assert_eq!(endpoints.len(), 10);
        assert_eq!(endpoints[0], PathBuf::from("/run/user/1000/discord-ipc-0"));
        assert_eq!(endpoints[9], PathBuf::from("/run/user/1000/discord-ipc-9"));
    }

    #[test]
    fn test_sandbox_dirs_only_when_populated() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(socket_candidates_in(temp.path()).len(), 10);

        let snap = temp.path().join("snap.discord");
        std::fs::create_dir_all(&snap).unwrap();
        assert_eq!(socket_candidates_in(temp.path()).len(), 10);

        std::fs::write(snap.join("marker"), b"").unwrap();
        let candidates = socket_candidates_in(temp.path());
        assert_eq!(candidates.len(), 20);
        assert_eq!(candidates[10], snap.join("discord-ipc-0"));
    }

    #[test]
    fn test_pipe_candidates() {
        let pipes = ipc_pipe_candidates();
        assert_eq!(pipes.len(), 10);
        assert_eq!(pipes[0], r"\\?\pipe\discord-ipc-0");
    }
}
