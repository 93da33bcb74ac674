//! Windows named pipe transport.
//!
//! Non-blocking reads peek the pipe with `PeekNamedPipe` and only read when
//! bytes are available.
#![allow(unsafe_code)]

use super::Transport;
use crate::error::TransportError;
use crate::platform::paths;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::windows::io::AsRawHandle;
use tracing::{debug, info};
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::System::Pipes::PeekNamedPipe;

/// Transport over the companion's named pipe.
#[derive(Debug, Default)]
pub struct NamedPipeTransport {
    candidates: Option<Vec<String>>,
    pipe: Option<File>,
    endpoint: Option<String>,
}

impl NamedPipeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only try the given pipe paths, in order.
    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self {
            candidates: Some(candidates),
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        self.close();
        err
    }

    fn available(pipe: &File) -> std::io::Result<u32> {
        let mut available: u32 = 0;
        // SAFETY: the handle is owned by `pipe` and stays valid for the call;
        // a null buffer with size 0 asks only for the byte counts.
        let ok = unsafe {
            PeekNamedPipe(
                pipe.as_raw_handle() as HANDLE,
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
                &mut available,
                std::ptr::null_mut(),
            )
        };

        if ok == 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(available)
        }
    }
}

impl Transport for NamedPipeTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.pipe.is_some() {
            return Ok(());
        }

        let candidates = match &self.candidates {
            Some(candidates) => candidates.clone(),
            None => paths::ipc_pipe_candidates(),
        };

        let mut denied: Option<String> = None;

        for name in &candidates {
            match OpenOptions::new().read(true).write(true).open(name) {
                Ok(pipe) => {
                    info!("Connected to IPC pipe {}", name);
                    self.pipe = Some(pipe);
                    self.endpoint = Some(name.clone());
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    debug!("Permission denied on IPC pipe {}", name);
                    denied.get_or_insert_with(|| name.clone());
                }
                Err(e) => {
                    debug!("Failed to open IPC pipe {}: {}", name, e);
                }
            }
        }

        match denied {
            Some(endpoint) => Err(TransportError::PermissionDenied { endpoint }),
            None => Err(TransportError::NotFound {
                attempted: candidates.len(),
            }),
        }
    }

    fn close(&mut self) {
        if self.pipe.take().is_some() {
            debug!("Closed IPC pipe");
        }
        self.endpoint = None;
    }

    fn is_open(&self) -> bool {
        self.pipe.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let pipe = self.pipe.as_mut().ok_or(TransportError::NotOpen)?;

        match pipe.write_all(bytes).and_then(|_| pipe.flush()) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Failed to write to IPC pipe: {}", e);
                Err(self.fail(TransportError::from_io(&e)))
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<usize, TransportError> {
        let pipe = self.pipe.as_mut().ok_or(TransportError::NotOpen)?;
        if buf.is_empty() {
            return Ok(0);
        }

        if !wait {
            match Self::available(pipe) {
                Ok(0) => return Ok(0),
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to peek IPC pipe: {}", e);
                    return Err(self.fail(TransportError::Closed));
                }
            }
        }

        match pipe.read(buf) {
            Ok(0) => Err(self.fail(TransportError::Closed)),
            Ok(n) => Ok(n),
            Err(e) => {
                debug!("Failed to read from IPC pipe: {}", e);
                Err(self.fail(TransportError::from_io(&e)))
            }
        }
    }
}
