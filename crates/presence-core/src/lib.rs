//! Presence Core - rich presence client for a local desktop companion process.
//!
//! The client talks to the companion over a local IPC channel (a Unix domain
//! socket or a Windows named pipe) using length-prefixed JSON frames. It keeps
//! the connection alive in the background, queues presence updates until the
//! companion is reachable, and reports join/spectate events through an
//! [`EventHandler`].
//!
//! # Example
//!
//! ```rust,ignore
//! use presence_core::{EventHandler, RichPresence, RpcClient, User};
//!
//! struct Handler;
//!
//! impl EventHandler for Handler {
//!     fn ready(&self, user: &User) {
//!         println!("Connected as {}", user.username);
//!     }
//! }
//!
//! let client = RpcClient::builder("1234567890")
//!     .with_handler(Handler)
//!     .start()?;
//!
//! let presence = RichPresence::new()
//!     .with_details("Exploring")
//!     .with_large_image("map", "World map");
//! client.update_presence(Some(&presence))?;
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod models;
pub mod platform;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use backoff::{format_duration, Backoff};
pub use config::SessionOptions;
pub use connection::{Connection, ConnectionEvents, ConnectionState};
pub use error::{ConnectionError, ErrorCode, FrameError, Result, RpcError, TransportError};
pub use frame::{Frame, FrameHeader, OpCode};
pub use handler::EventHandler;
pub use models::{
    ActivityType, Button, JoinReply, JoinRequest, Message, PartyPrivacy, RichPresence, User,
};
pub use session::{RpcClient, SessionBuilder};
pub use transport::{MemoryEndpoint, MemoryTransport, Transport, TransportFactory};
