//! In-process transport with a scripted companion.
//!
//! A [`MemoryEndpoint`] stands in for the companion process. Tests push
//! frames for the client to read, inspect the frames the client wrote, and
//! inject failures (endpoint missing, permission denied, failing writes,
//! severed channel, fragmented reads).

use super::{Transport, TransportFactory};
use crate::error::TransportError;
use crate::frame::{self, Frame, OpCode};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
struct EndpointState {
    listening: bool,
    permission_denied: bool,
    connected: bool,
    severed: bool,
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    failing_writes: usize,
    read_chunk: Option<usize>,
    opens: usize,
}

impl Default for EndpointState {
    fn default() -> Self {
        Self {
            listening: true,
            permission_denied: false,
            connected: false,
            severed: false,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            failing_writes: 0,
            read_chunk: None,
            opens: 0,
        }
    }
}

/// Shared handle to the scripted companion side.
#[derive(Debug, Clone, Default)]
pub struct MemoryEndpoint {
    state: Arc<Mutex<EndpointState>>,
}

impl MemoryEndpoint {
    /// A listening endpoint with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A client-side transport bound to this endpoint.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            endpoint: self.clone(),
            open: false,
        }
    }

    /// A factory handing out transports bound to this endpoint.
    pub fn factory(&self) -> impl TransportFactory + 'static {
        let endpoint = self.clone();
        move || Box::new(endpoint.transport()) as Box<dyn Transport>
    }

    /// Whether open attempts find a companion.
    pub fn set_listening(&self, listening: bool) {
        self.state.lock().listening = listening;
    }

    /// Make open attempts fail with a permission error.
    pub fn set_permission_denied(&self, denied: bool) {
        self.state.lock().permission_denied = denied;
    }

    /// Cap the number of bytes a single read returns.
    pub fn set_read_chunk(&self, chunk: Option<usize>) {
        self.state.lock().read_chunk = chunk;
    }

    /// Fail the next `count` writes.
    pub fn fail_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    /// Drop the channel from the companion side.
    pub fn sever(&self) {
        self.state.lock().severed = true;
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// Queue one encoded frame for the client.
    pub fn push_frame(&self, opcode: OpCode, payload: &[u8]) {
        let bytes = frame::encode(opcode, payload).unwrap_or_default();
        self.push_bytes(&bytes);
    }

    /// Queue a `FRAME` carrying `message`.
    pub fn push_message(&self, message: &serde_json::Value) {
        self.push_frame(OpCode::Frame, message.to_string().as_bytes());
    }

    /// Drain and decode everything the client has written.
    ///
    /// Trailing bytes that do not form a whole frame are discarded.
    pub fn take_written(&self) -> Vec<Frame> {
        let bytes = std::mem::take(&mut self.state.lock().outbound);
        let mut frames = Vec::new();
        let mut rest = bytes.as_slice();

        while let Ok(frame) = Frame::decode(rest) {
            rest = &rest[frame::FrameHeader::SIZE + frame.payload.len()..];
            frames.push(frame);
        }

        frames
    }

    /// Drain written `FRAME` payloads as JSON values.
    pub fn take_written_messages(&self) -> Vec<serde_json::Value> {
        self.take_written()
            .into_iter()
            .filter(|f| f.opcode == OpCode::Frame)
            .filter_map(|f| serde_json::from_slice(&f.payload).ok())
            .collect()
    }

    /// True while a client transport holds the channel open.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }
}

/// Client side of a [`MemoryEndpoint`].
#[derive(Debug)]
pub struct MemoryTransport {
    endpoint: MemoryEndpoint,
    open: bool,
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.endpoint.state.lock();

        if state.permission_denied {
            return Err(TransportError::PermissionDenied {
                endpoint: "memory".to_string(),
            });
        }
        if !state.listening {
            return Err(TransportError::NotFound { attempted: 1 });
        }

        state.connected = true;
        state.severed = false;
        state.opens += 1;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }

        let mut state = self.endpoint.state.lock();
        state.connected = false;
        state.inbound.clear();
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open && !self.endpoint.state.lock().severed
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let mut state = self.endpoint.state.lock();
        if state.severed {
            return Err(TransportError::Closed);
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(TransportError::Io {
                message: "scripted write failure".to_string(),
                kind: std::io::ErrorKind::Other,
            });
        }

        state.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.endpoint.state.lock();

        if state.inbound.is_empty() {
            if state.severed {
                state.connected = false;
                drop(state);
                self.open = false;
                return Err(TransportError::Closed);
            }
            if !wait {
                return Ok(0);
            }
            // Nothing will ever arrive on a blocking read; report it instead
            // of hanging the caller.
            return Err(TransportError::Io {
                message: "blocking read on empty memory channel".to_string(),
                kind: std::io::ErrorKind::TimedOut,
            });
        }

        let limit = state.read_chunk.unwrap_or(usize::MAX).max(1);
        let n = buf.len().min(state.inbound.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_respects_listening_and_permissions() {
        let endpoint = MemoryEndpoint::new();
        let mut transport = endpoint.transport();

        endpoint.set_listening(false);
        assert_eq!(
            transport.open(),
            Err(TransportError::NotFound { attempted: 1 })
        );

        endpoint.set_listening(true);
        endpoint.set_permission_denied(true);
        assert!(matches!(
            transport.open(),
            Err(TransportError::PermissionDenied { .. })
        ));

        endpoint.set_permission_denied(false);
        assert!(transport.open().is_ok());
        assert!(endpoint.is_connected());
    }

    #[test]
    fn test_written_frames_are_decoded() {
        let endpoint = MemoryEndpoint::new();
        let mut transport = endpoint.transport();
        transport.open().unwrap();

        transport
            .write(&frame::encode(OpCode::Frame, b"{\"a\":1}").unwrap())
            .unwrap();
        transport
            .write(&frame::encode(OpCode::Pong, b"x").unwrap())
            .unwrap();

        let frames = endpoint.take_written();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].opcode, OpCode::Frame);
        assert_eq!(frames[1], Frame::new(OpCode::Pong, b"x".to_vec()));
        assert!(endpoint.take_written().is_empty());
    }

    #[test]
    fn test_severed_channel_reports_closed() {
        let endpoint = MemoryEndpoint::new();
        let mut transport = endpoint.transport();
        transport.open().unwrap();

        endpoint.sever();
        assert!(!transport.is_open());

        let mut buf = [0u8; 8];
        assert_eq!(transport.read(&mut buf, false), Err(TransportError::Closed));
    }

    #[test]
    fn test_close_discards_unread_bytes() {
        let endpoint = MemoryEndpoint::new();
        let mut transport = endpoint.transport();
        transport.open().unwrap();

        endpoint.push_frame(OpCode::Frame, b"{}");
        transport.close();

        assert_eq!(endpoint.pending_inbound(), 0);
        assert!(!endpoint.is_connected());
    }
}
