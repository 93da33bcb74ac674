//! Platform abstraction layer.
//!
//! All `#[cfg]` selection of transports happens here so the connection and
//! session code never branch on the operating system.
//!
//! # Supported Platforms
//!
//! - **Linux**, **macOS** and other Unix: domain sockets
//! - **Windows**: named pipes

pub mod paths;

use crate::error::Result;
use crate::transport::TransportFactory;

pub use paths::{ipc_pipe_candidates, ipc_socket_candidates, ipc_temp_dir};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(all(unix, not(any(target_os = "linux", target_os = "macos"))))]
    {
        "unix"
    }
    #[cfg(not(any(unix, windows)))]
    {
        "unknown"
    }
}

/// Returns true if a transport exists for the current platform.
pub fn is_supported_platform() -> bool {
    cfg!(any(unix, windows))
}

/// The transport factory for the current platform.
///
/// Fails with [`RpcError::UnsupportedPlatform`](crate::error::RpcError::UnsupportedPlatform) where no IPC transport
/// exists. This is the only platform check the client performs.
pub fn default_transport_factory() -> Result<Box<dyn TransportFactory>> {
    #[cfg(unix)]
    {
        use crate::transport::{Transport, UnixSocketTransport};

        let factory = || Box::new(UnixSocketTransport::new()) as Box<dyn Transport>;
        Ok(Box::new(factory))
    }

    #[cfg(windows)]
    {
        use crate::transport::{NamedPipeTransport, Transport};

        let factory = || Box::new(NamedPipeTransport::new()) as Box<dyn Transport>;
        Ok(Box::new(factory))
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(crate::error::RpcError::UnsupportedPlatform {
            platform: current_platform().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_platform() {
        let platform = current_platform();
        assert!(["linux", "windows", "macos", "unix", "unknown"].contains(&platform));
    }

    #[test]
    fn test_default_factory_on_supported_platform() {
        #[cfg(any(unix, windows))]
        {
            assert!(is_supported_platform());
            let factory = default_transport_factory().unwrap();
            let transport = factory.create();
            assert!(!transport.is_open());
        }
    }
}
