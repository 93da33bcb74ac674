//! Error types for the presence IPC client.
//!
//! Errors are layered the same way the client is: the frame codec, the
//! transport, the connection state machine and the session each have their
//! own enum, and each layer converts the one below it with `#[from]`.

use std::fmt;
use thiserror::Error;

/// Numeric error codes reported by the companion process and by the client.
///
/// Codes arrive as plain integers (inside `CLOSE` frames and `ERROR` events).
/// Anything outside the known table maps to [`ErrorCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    Success,
    PipeClosed,
    ReadCorrupt,
    Unknown,
}

impl ErrorCode {
    /// Map a wire code onto the table.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ErrorCode::Success,
            1 => ErrorCode::PipeClosed,
            2 => ErrorCode::ReadCorrupt,
            _ => ErrorCode::Unknown,
        }
    }

    /// The integer value of this code.
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::PipeClosed => 1,
            ErrorCode::ReadCorrupt => 2,
            ErrorCode::Unknown => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Success => "SUCCESS",
            ErrorCode::PipeClosed => "PIPE_CLOSED",
            ErrorCode::ReadCorrupt => "READ_CORRUPT",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Frame header needs 8 bytes, got {len}")]
    ShortHeader { len: usize },

    #[error("Unknown frame opcode {0}")]
    UnknownOpcode(u32),

    #[error("Frame payload truncated: expected {expected} bytes, got {actual}")]
    ShortPayload { expected: usize, actual: usize },

    #[error("Frame payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
///
/// Variants carry rendered messages instead of `std::io::Error` so the last
/// failure can be cloned out of the session for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No companion process was reachable on any candidate endpoint.
    #[error("No IPC endpoint found after trying {attempted} candidates")]
    NotFound { attempted: usize },

    /// An endpoint exists but the current user may not open it.
    #[error("Permission denied opening IPC endpoint {endpoint}")]
    PermissionDenied { endpoint: String },

    /// The peer closed the channel.
    #[error("IPC channel closed by peer")]
    Closed,

    #[error("IPC channel is not open")]
    NotOpen,

    #[error("IPC I/O error: {message}")]
    Io {
        message: String,
        kind: std::io::ErrorKind,
    },
}

impl TransportError {
    /// Classify an I/O error raised while moving bytes on an open channel.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => TransportError::Closed,
            kind => TransportError::Io {
                message: err.to_string(),
                kind,
            },
        }
    }

    /// True when the failure means "nobody is listening", as opposed to an
    /// endpoint that exists but refused us.
    pub fn is_absent(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

/// Errors reported by the [`Connection`](crate::connection::Connection).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    /// Reads need a handshake in flight or a ready connection.
    #[error("Connection is not open")]
    NotOpen,

    /// A non-blocking read found nothing to consume.
    #[error("No data available")]
    NoData,

    /// The connection was closed while handling the call.
    #[error("Connection closed ({code}): {message}")]
    Closed { code: ErrorCode, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Main error type for session operations.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Unsupported platform: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Session has been shut down")]
    SessionClosed,

    #[error("Not connected to the companion process")]
    NotConnected,

    #[error("Invalid application id: {0:?}")]
    InvalidApplicationId(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, RpcError>;

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
