//! Byte-channel transports to the companion process.
//!
//! The connection never touches sockets or pipes directly. It asks a
//! [`TransportFactory`] for a fresh [`Transport`] on every open attempt and
//! drops it on close.
//!
//! # Implementations
//!
//! - [`UnixSocketTransport`]: Unix domain socket (Linux, macOS)
//! - [`NamedPipeTransport`]: named pipe (Windows)
//! - [`MemoryTransport`]: in-process scripted peer for tests and embedding

pub mod memory;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

pub use memory::{MemoryEndpoint, MemoryTransport};
#[cfg(unix)]
pub use unix::UnixSocketTransport;
#[cfg(windows)]
pub use windows::NamedPipeTransport;

use crate::error::TransportError;

/// Duplex byte channel to the companion process.
pub trait Transport: Send {
    /// Connect to the first reachable endpoint.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Release the channel. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes.
    ///
    /// With `wait == false` this returns `Ok(0)` when nothing is available
    /// yet. With `wait == true` it blocks until at least one byte arrives.
    /// A peer hang-up is reported as [`TransportError::Closed`] and leaves
    /// the transport closed.
    fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<usize, TransportError>;
}

/// Creates a new transport for each open attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Box<dyn Transport> {
        self()
    }
}

/// Fill `buf` completely.
///
/// The first read honours `wait`; if it finds nothing, `Ok(false)` is
/// returned and nothing was consumed. Once any byte has arrived the remaining
/// reads block, so a frame split across reads is reassembled in order.
pub fn read_exact(
    transport: &mut dyn Transport,
    buf: &mut [u8],
    wait: bool,
) -> Result<bool, TransportError> {
    let mut filled = 0;

    while filled < buf.len() {
        let blocking = wait || filled > 0;
        let n = transport.read(&mut buf[filled..], blocking)?;

        if n == 0 {
            if !blocking {
                return Ok(false);
            }
            return Err(TransportError::Closed);
        }

        filled += n;
    }

    Ok(true)
}
