//! Unix domain socket transport.

use super::Transport;
use crate::error::TransportError;
use crate::platform::paths;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Transport over the companion's Unix domain socket.
///
/// Candidate socket paths are resolved on every [`open`](Transport::open)
/// unless fixed with [`with_candidates`](Self::with_candidates), so a
/// companion started after the client is still found.
#[derive(Debug, Default)]
pub struct UnixSocketTransport {
    candidates: Option<Vec<PathBuf>>,
    stream: Option<UnixStream>,
    endpoint: Option<PathBuf>,
}

impl UnixSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only try the given socket paths, in order.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates: Some(candidates),
            ..Self::default()
        }
    }

    /// The socket path of the open connection.
    pub fn endpoint(&self) -> Option<&Path> {
        self.endpoint.as_deref()
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        self.close();
        err
    }
}

impl Transport for UnixSocketTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let candidates = match &self.candidates {
            Some(candidates) => candidates.clone(),
            None => paths::ipc_socket_candidates(),
        };

        let mut denied: Option<PathBuf> = None;

        for path in &candidates {
            match UnixStream::connect(path) {
                Ok(stream) => {
                    info!("Connected to IPC socket {}", path.display());
                    self.stream = Some(stream);
                    self.endpoint = Some(path.clone());
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    debug!("Permission denied on IPC socket {}", path.display());
                    denied.get_or_insert_with(|| path.clone());
                }
                Err(e) => {
                    debug!("Failed to connect to IPC socket {}: {}", path.display(), e);
                }
            }
        }

        match denied {
            Some(path) => Err(TransportError::PermissionDenied {
                endpoint: path.display().to_string(),
            }),
            None => Err(TransportError::NotFound {
                attempted: candidates.len(),
            }),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!("Closed IPC socket");
        }
        self.endpoint = None;
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let result = stream
            .set_nonblocking(false)
            .and_then(|_| stream.write_all(bytes))
            .and_then(|_| stream.flush());

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Failed to write to IPC socket: {}", e);
                Err(self.fail(TransportError::from_io(&e)))
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        if buf.is_empty() {
            return Ok(0);
        }

        if let Err(e) = stream.set_nonblocking(!wait) {
            return Err(self.fail(TransportError::from_io(&e)));
        }

        loop {
            match stream.read(buf) {
                Ok(0) => return Err(self.fail(TransportError::Closed)),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock && !wait => return Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Failed to read from IPC socket: {}", e);
                    return Err(self.fail(TransportError::from_io(&e)));
                }
            }
        }
    }
}
