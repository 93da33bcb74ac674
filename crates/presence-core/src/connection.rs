//! Connection state machine over a single transport.
//!
//! A [`Connection`] moves through three states:
//!
//! ```text
//! Disconnected --open: transport up, handshake sent--> SentHandshake
//! SentHandshake --open: DISPATCH/READY received-----> Connected
//! any ------------close / read or write failure-----> Disconnected
//! ```
//!
//! The transport is created from the factory on every open attempt and
//! dropped on close, so a companion restart is picked up on the next attempt.
//!
//! # Thread Safety
//!
//! `Connection` is not internally synchronized. The session keeps it behind a
//! single mutex, which is also what serializes every write on the wire.

use crate::error::{ConnectionError, ErrorCode, TransportError};
use crate::frame::{self, FrameHeader, OpCode};
use crate::models::message::{self, Commands, ErrorPayload, Events, Message};
use crate::models::user::User;
use crate::transport::{self, Transport, TransportFactory};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PIPE_CLOSED_MESSAGE: &str = "Pipe Closed";
const BAD_FRAME_MESSAGE: &str = "Bad IPC Frame";
const PARTIAL_FRAME_MESSAGE: &str = "Partial data in frame";

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    SentHandshake,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::SentHandshake => "sent_handshake",
            ConnectionState::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives connection lifecycle changes.
///
/// Called with the connection borrowed mutably, so implementations must not
/// call back into the connection.
pub trait ConnectionEvents: Send + Sync {
    /// The companion sent `READY`.
    fn on_connected(&self, user: &User);

    /// A handshaking or ready connection was closed.
    fn on_disconnected(&self, code: ErrorCode, message: &str);
}

/// One logical connection to the companion process.
pub struct Connection {
    application_id: String,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    last_error_code: ErrorCode,
    last_error_message: String,
    last_transport_error: Option<TransportError>,
    events: Option<Arc<dyn ConnectionEvents>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("application_id", &self.application_id)
            .field("state", &self.state)
            .field("last_error_code", &self.last_error_code)
            .field("last_error_message", &self.last_error_message)
            .finish()
    }
}

impl Connection {
    pub fn new(application_id: impl Into<String>, factory: Box<dyn TransportFactory>) -> Self {
        Self {
            application_id: application_id.into(),
            factory,
            transport: None,
            state: ConnectionState::Disconnected,
            last_error_code: ErrorCode::Success,
            last_error_message: String::new(),
            last_transport_error: None,
            events: None,
        }
    }

    /// Install or clear the lifecycle callbacks.
    pub fn set_events(&mut self, events: Option<Arc<dyn ConnectionEvents>>) {
        self.events = events;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Ready and the transport still reports open.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// Cause recorded by the most recent close.
    pub fn last_error(&self) -> (ErrorCode, &str) {
        (self.last_error_code, &self.last_error_message)
    }

    /// Failure of the most recent transport open attempt, cleared on success.
    pub fn last_transport_error(&self) -> Option<&TransportError> {
        self.last_transport_error.as_ref()
    }

    /// Advance the connection by one step.
    ///
    /// From `Disconnected` this opens a transport and sends the handshake.
    /// From `SentHandshake` it polls once, without blocking, for `READY`.
    /// A ready connection is left alone unless its transport hung up, in
    /// which case it is closed with `PIPE_CLOSED`.
    pub fn open(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Connected => {
                if self.close_if_severed() {
                    Err(ConnectionError::Closed {
                        code: ErrorCode::PipeClosed,
                        message: PIPE_CLOSED_MESSAGE.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            ConnectionState::Disconnected => self.start_handshake(),
            ConnectionState::SentHandshake => self.await_ready(),
        }
    }

    /// Close a ready connection whose transport no longer reports open.
    ///
    /// Returns true if the connection was closed.
    pub fn close_if_severed(&mut self) -> bool {
        if self.state != ConnectionState::Connected || self.is_open() {
            return false;
        }

        debug!("Transport hung up outside a read");
        self.close_with(ErrorCode::PipeClosed, PIPE_CLOSED_MESSAGE);
        true
    }

    fn start_handshake(&mut self) -> Result<(), ConnectionError> {
        let mut transport = self.factory.create();

        if let Err(e) = transport.open() {
            match &e {
                TransportError::NotFound { attempted } => {
                    debug!("No companion endpoint found ({} candidates)", attempted)
                }
                TransportError::PermissionDenied { endpoint } => {
                    warn!("Permission denied opening companion endpoint {}", endpoint)
                }
                other => warn!("Failed to open companion transport: {}", other),
            }
            self.last_transport_error = Some(e.clone());
            return Err(e.into());
        }

        self.last_transport_error = None;
        self.last_error_code = ErrorCode::Success;
        self.last_error_message.clear();
        self.transport = Some(transport);

        let payload = message::handshake(&self.application_id).to_string();
        let bytes = frame::encode(OpCode::Handshake, payload.as_bytes())?;

        if let Err(e) = self.send(&bytes) {
            warn!("Failed to send handshake: {}", e);
            self.close();
            return Err(e.into());
        }

        debug!("Sent handshake for application {}", self.application_id);
        self.state = ConnectionState::SentHandshake;
        Ok(())
    }

    fn await_ready(&mut self) -> Result<(), ConnectionError> {
        let message = match self.read(false) {
            Ok(message) => message,
            Err(ConnectionError::NoData) => return Ok(()),
            Err(e) => return Err(e),
        };

        if message.cmd() != Some(Commands::DISPATCH) || !message.is_event(Events::READY) {
            debug!("Ignoring message while awaiting READY: {:?}", message.evt());
            return Ok(());
        }

        let user = message
            .data()
            .and_then(|data| data.get("user"))
            .and_then(|user| User::from_value(user).ok())
            .unwrap_or_default();

        self.state = ConnectionState::Connected;
        info!("Connected to companion as user {}", user.user_id);

        if let Some(events) = &self.events {
            events.on_connected(&user);
        }
        Ok(())
    }

    /// Read the next JSON message.
    ///
    /// `PONG` frames are skipped. `CLOSE`, `PING`, protocol errors and a
    /// hung-up transport all close the connection and fail the call with
    /// [`ConnectionError::Closed`]. With `wait == false` and nothing pending
    /// the call fails with [`ConnectionError::NoData`].
    pub fn read(&mut self, wait: bool) -> Result<Message, ConnectionError> {
        if self.state == ConnectionState::Disconnected {
            return Err(ConnectionError::NotOpen);
        }

        loop {
            let transport = self.transport.as_mut().ok_or(ConnectionError::NotOpen)?;

            let mut header_bytes = [0u8; FrameHeader::SIZE];
            match transport::read_exact(transport.as_mut(), &mut header_bytes, wait) {
                Ok(true) => {}
                Ok(false) => return Err(ConnectionError::NoData),
                Err(e) => {
                    if e == TransportError::Closed || !transport.is_open() {
                        return Err(self.close_with(ErrorCode::PipeClosed, PIPE_CLOSED_MESSAGE));
                    }
                    return Err(e.into());
                }
            }

            let header = match FrameHeader::decode(&header_bytes) {
                Ok(header) => header,
                Err(e) => {
                    debug!("Undecodable frame header: {}", e);
                    return Err(self.close_with(ErrorCode::ReadCorrupt, BAD_FRAME_MESSAGE));
                }
            };

            let mut payload = vec![0u8; header.length];
            if header.length > 0 {
                match transport::read_exact(transport.as_mut(), &mut payload, true) {
                    Ok(true) => {}
                    Ok(false) | Err(_) => {
                        return Err(
                            self.close_with(ErrorCode::ReadCorrupt, PARTIAL_FRAME_MESSAGE)
                        );
                    }
                }
            }

            let text = match frame::decode_payload(&payload, header.length) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Undecodable {} payload: {}", header.opcode, e);
                    return Err(self.close_with(ErrorCode::ReadCorrupt, PARTIAL_FRAME_MESSAGE));
                }
            };

            match header.opcode {
                OpCode::Frame => match Message::parse(text) {
                    Ok(message) => return Ok(message),
                    Err(e) => {
                        debug!("Malformed JSON in frame: {}", e);
                        return Err(
                            self.close_with(ErrorCode::ReadCorrupt, PARTIAL_FRAME_MESSAGE)
                        );
                    }
                },
                OpCode::Close => {
                    let cause = serde_json::from_str::<serde_json::Value>(text)
                        .map(|value| ErrorPayload::from_value(&value))
                        .unwrap_or_default();
                    let code = cause.code.map(ErrorCode::from_code).unwrap_or_default();
                    let reason = cause.message.unwrap_or_default();

                    info!("Companion closed the connection ({}): {}", code, reason);
                    return Err(self.close_with(code, &reason));
                }
                OpCode::Ping => {
                    let pong = frame::encode(OpCode::Pong, &payload)?;
                    if let Err(e) = self.send(&pong) {
                        debug!("Failed to answer PING: {}", e);
                    }
                    debug!("Answered PING, closing connection");
                    let (code, reason) = (self.last_error_code, self.last_error_message.clone());
                    return Err(self.close_with(code, &reason));
                }
                OpCode::Pong => continue,
                OpCode::Handshake => {
                    debug!("Unexpected HANDSHAKE frame from companion");
                    return Err(self.close_with(ErrorCode::ReadCorrupt, BAD_FRAME_MESSAGE));
                }
            }
        }
    }

    /// Send `payload` as a `FRAME`. A failed write closes the connection.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let bytes = frame::encode(OpCode::Frame, payload)?;

        match self.send(&bytes) {
            Ok(()) => Ok(()),
            Err(TransportError::NotOpen) => Err(ConnectionError::NotOpen),
            Err(e) => {
                debug!("Write failed, closing connection: {}", e);
                self.last_error_code = ErrorCode::PipeClosed;
                self.last_error_message = PIPE_CLOSED_MESSAGE.to_string();
                self.close();
                Err(e.into())
            }
        }
    }

    /// Drop the transport and return to `Disconnected`.
    ///
    /// The disconnected callback fires only when leaving `SentHandshake` or
    /// `Connected`, so repeated calls are harmless.
    pub fn close(&mut self) {
        let was_active = self.state != ConnectionState::Disconnected;

        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = ConnectionState::Disconnected;

        if was_active {
            debug!(
                "Connection closed ({}): {}",
                self.last_error_code, self.last_error_message
            );
            if let Some(events) = &self.events {
                events.on_disconnected(self.last_error_code, &self.last_error_message);
            }
        }
    }

    fn close_with(&mut self, code: ErrorCode, message: &str) -> ConnectionError {
        self.last_error_code = code;
        self.last_error_message = message.to_string();
        self.close();
        ConnectionError::Closed {
            code,
            message: message.to_string(),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let transport = self.transport.as_mut().ok_or(TransportError::NotOpen)?;
        transport.write(bytes)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::transport::MemoryEndpoint;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConnectionEvents for Recorder {
        fn on_connected(&self, user: &User) {
            self.events.lock().push(format!("connected:{}", user.user_id));
        }

        fn on_disconnected(&self, code: ErrorCode, message: &str) {
            self.events
                .lock()
                .push(format!("disconnected:{}:{}", code, message));
        }
    }

    fn ready() -> serde_json::Value {
        json!({
            "cmd": "DISPATCH",
            "evt": "READY",
            "data": {"v": 1, "user": {"id": "42", "username": "ann"}}
        })
    }

    fn connection(endpoint: &MemoryEndpoint) -> (Connection, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut connection = Connection::new("1234", Box::new(endpoint.factory()));
        connection.set_events(Some(recorder.clone()));
        (connection, recorder)
    }

    fn connected(endpoint: &MemoryEndpoint) -> (Connection, Arc<Recorder>) {
        let (mut connection, recorder) = connection(endpoint);
        connection.open().unwrap();
        endpoint.push_message(&ready());
        connection.open().unwrap();
        assert_eq!(connection.state(), ConnectionState::Connected);
        endpoint.take_written();
        (connection, recorder)
    }

    #[test]
    fn test_open_sends_handshake() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connection(&endpoint);

        connection.open().unwrap();

        assert_eq!(connection.state(), ConnectionState::SentHandshake);
        assert!(!connection.is_open());
        let written = endpoint.take_written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].opcode, OpCode::Handshake);
        let handshake: serde_json::Value = serde_json::from_slice(&written[0].payload).unwrap();
        assert_eq!(handshake, json!({"v": 1, "client_id": "1234"}));
    }

    #[test]
    fn test_open_failure_leaves_state_untouched() {
        let endpoint = MemoryEndpoint::new();
        endpoint.set_listening(false);
        let (mut connection, recorder) = connection(&endpoint);

        let err = connection.open().unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Transport(TransportError::NotFound { .. })
        ));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(connection.last_transport_error().unwrap().is_absent());
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_permission_denied_is_recorded() {
        let endpoint = MemoryEndpoint::new();
        endpoint.set_permission_denied(true);
        let (mut connection, _) = connection(&endpoint);

        assert!(connection.open().is_err());
        assert!(matches!(
            connection.last_transport_error(),
            Some(TransportError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_handshake_write_failure_closes() {
        let endpoint = MemoryEndpoint::new();
        endpoint.fail_writes(1);
        let (mut connection, recorder) = connection(&endpoint);

        assert!(connection.open().is_err());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(!endpoint.is_connected());
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_ready_connects_and_reports_user() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connection(&endpoint);

        connection.open().unwrap();
        connection.open().unwrap();
        assert_eq!(connection.state(), ConnectionState::SentHandshake);

        endpoint.push_message(&json!({"cmd": "DISPATCH", "evt": "SOMETHING_ELSE"}));
        connection.open().unwrap();
        assert_eq!(connection.state(), ConnectionState::SentHandshake);

        endpoint.push_message(&ready());
        connection.open().unwrap();

        assert_eq!(connection.state(), ConnectionState::Connected);
        assert!(connection.is_open());
        assert_eq!(*recorder.events.lock(), vec!["connected:42".to_string()]);
    }

    #[test]
    fn test_read_requires_open_connection() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connection(&endpoint);

        assert_eq!(connection.read(false), Err(ConnectionError::NotOpen));
    }

    #[test]
    fn test_read_returns_messages_and_skips_pong() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        endpoint.push_frame(OpCode::Pong, b"{}");
        endpoint.push_message(&json!({"evt": "ACTIVITY_JOIN", "data": {"secret": "s"}}));

        let message = connection.read(false).unwrap();
        assert!(message.is_event(Events::ACTIVITY_JOIN));
        assert_eq!(connection.read(false), Err(ConnectionError::NoData));
        assert!(connection.is_open());
    }

    #[test]
    fn test_close_frame_reports_peer_cause() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        endpoint.push_frame(OpCode::Close, br#"{"code":1,"message":"bye"}"#);

        assert_eq!(
            connection.read(false),
            Err(ConnectionError::Closed {
                code: ErrorCode::PipeClosed,
                message: "bye".into()
            })
        );
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(
            *recorder.events.lock(),
            vec![
                "connected:42".to_string(),
                "disconnected:PIPE_CLOSED:bye".to_string()
            ]
        );
    }

    #[test]
    fn test_close_frame_code_mapping() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);
        endpoint.push_frame(OpCode::Close, br#"{"message":"no code"}"#);
        assert!(connection.read(false).is_err());
        assert_eq!(connection.last_error(), (ErrorCode::Success, "no code"));

        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);
        endpoint.push_frame(OpCode::Close, br#"{"code":4000,"message":"invalid"}"#);
        assert!(connection.read(false).is_err());
        assert_eq!(connection.last_error().0, ErrorCode::Unknown);
    }

    #[test]
    fn test_ping_answered_with_identical_pong_then_closed() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        endpoint.push_frame(OpCode::Ping, br#"{"t":7}"#);

        assert!(matches!(
            connection.read(false),
            Err(ConnectionError::Closed { .. })
        ));
        assert_eq!(
            endpoint.take_written(),
            vec![Frame::new(OpCode::Pong, br#"{"t":7}"#.to_vec())]
        );
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[test]
    fn test_handshake_frame_from_peer_is_corrupt() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        endpoint.push_frame(OpCode::Handshake, b"{}");

        assert_eq!(
            connection.read(false),
            Err(ConnectionError::Closed {
                code: ErrorCode::ReadCorrupt,
                message: BAD_FRAME_MESSAGE.into()
            })
        );
    }

    #[test]
    fn test_bad_header_is_corrupt() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&9u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        endpoint.push_bytes(&bytes);

        assert!(connection.read(false).is_err());
        assert_eq!(connection.last_error(), (ErrorCode::ReadCorrupt, BAD_FRAME_MESSAGE));
    }

    #[test]
    fn test_short_payload_is_corrupt() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&20u32.to_le_bytes());
        bytes.extend_from_slice(b"{\"cmd\"");
        endpoint.push_bytes(&bytes);

        assert!(connection.read(false).is_err());
        assert_eq!(
            connection.last_error(),
            (ErrorCode::ReadCorrupt, PARTIAL_FRAME_MESSAGE)
        );
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_invalid_utf8_and_json_are_corrupt() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);
        endpoint.push_frame(OpCode::Frame, &[0xff, 0xfe]);
        assert!(connection.read(false).is_err());
        assert_eq!(connection.last_error().0, ErrorCode::ReadCorrupt);

        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);
        endpoint.push_frame(OpCode::Frame, b"not json");
        assert!(connection.read(false).is_err());
        assert_eq!(connection.last_error().0, ErrorCode::ReadCorrupt);
    }

    #[test]
    fn test_severed_transport_reports_pipe_closed() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        endpoint.sever();
        assert!(!connection.is_open());

        assert_eq!(
            connection.read(false),
            Err(ConnectionError::Closed {
                code: ErrorCode::PipeClosed,
                message: PIPE_CLOSED_MESSAGE.into()
            })
        );
        assert_eq!(
            recorder.events.lock().last().map(String::as_str),
            Some("disconnected:PIPE_CLOSED:Pipe Closed")
        );
    }

    #[test]
    fn test_open_closes_severed_ready_connection() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        endpoint.sever();

        assert_eq!(
            connection.open(),
            Err(ConnectionError::Closed {
                code: ErrorCode::PipeClosed,
                message: PIPE_CLOSED_MESSAGE.into()
            })
        );
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(
            recorder.events.lock().last().map(String::as_str),
            Some("disconnected:PIPE_CLOSED:Pipe Closed")
        );
        assert!(!connection.close_if_severed());
    }

    #[test]
    fn test_fragmented_frames_are_reassembled() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        endpoint.set_read_chunk(Some(3));
        endpoint.push_frame(OpCode::Pong, b"{}");
        endpoint.push_message(&json!({"evt": "ACTIVITY_SPECTATE", "data": {"secret": "abc"}}));

        let message = connection.read(false).unwrap();
        assert!(message.is_event(Events::ACTIVITY_SPECTATE));
        assert_eq!(message.data_str("secret"), Some("abc"));
        assert_eq!(endpoint.pending_inbound(), 0);
        assert!(connection.is_open());
    }

    #[test]
    fn test_write_failure_closes() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        endpoint.fail_writes(1);
        assert!(connection.write(b"{}").is_err());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[test]
    fn test_write_sends_frame() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        connection
            .write(json!({"cmd": "SUBSCRIBE"}).to_string().as_bytes())
            .unwrap();

        assert_eq!(
            endpoint.take_written_messages(),
            vec![json!({"cmd": "SUBSCRIBE"})]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, recorder) = connected(&endpoint);

        connection.close();
        connection.close();

        assert_eq!(recorder.events.lock().len(), 2);
        assert!(!endpoint.is_connected());
    }

    #[test]
    fn test_reopen_creates_fresh_transport() {
        let endpoint = MemoryEndpoint::new();
        let (mut connection, _) = connected(&endpoint);

        connection.close();
        connection.open().unwrap();

        assert_eq!(endpoint.open_count(), 2);
        assert_eq!(connection.state(), ConnectionState::SentHandshake);
    }
}
