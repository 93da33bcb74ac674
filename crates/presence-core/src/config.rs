//! Centralized configuration for the presence client.
//!
//! Protocol constants, session timing and transport discovery parameters live
//! here, along with [`SessionOptions`] for the values a caller may override.

use std::time::Duration;

/// Wire protocol constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Handshake protocol version sent as `v`.
    pub const VERSION: u32 = 1;
    pub const HEADER_SIZE: usize = 8;
    pub const MAX_FRAME_SIZE: usize = 64 * 1024 - 1;
    pub const MAX_PAYLOAD_SIZE: usize = Self::MAX_FRAME_SIZE - Self::HEADER_SIZE;
}

/// Session loop timing.
pub struct SessionConfig;

impl SessionConfig {
    pub const IDLE_TIMEOUT: Duration = Duration::from_millis(500);
    pub const RECONNECT_MIN_DELAY: Duration = Duration::from_millis(500);
    pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);
    pub const IO_THREAD_NAME: &'static str = "presence-io";
}

/// Endpoint discovery for the platform transports.
pub struct TransportConfig;

impl TransportConfig {
    pub const ENDPOINT_PREFIX: &'static str = "discord-ipc-";
    /// Number of numbered endpoints tried per directory.
    pub const ENDPOINT_CANDIDATES: usize = 10;
    /// Temp-directory variables checked in order before falling back to `/tmp`.
    pub const TEMP_DIR_VARS: [&'static str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];
    pub const FALLBACK_TEMP_DIR: &'static str = "/tmp";
    /// Sandboxed client directories under the temp dir (snap, flatpak).
    pub const SANDBOX_DIRS: [&'static str; 2] = ["snap.discord", "app/com.discordapp.Discord"];
    pub const PIPE_PREFIX: &'static str = r"\\?\pipe\";
}

/// Limits applied to presence payloads.
pub struct PresenceConfig;

impl PresenceConfig {
    pub const MAX_BUTTONS: usize = 2;
    pub const MAX_BUTTON_LABEL_CHARS: usize = 32;
}

/// Caller-tunable session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Run `poll` and `dispatch_callbacks` on a background thread.
    pub io_thread: bool,
    /// Upper bound on how long the IO thread sleeps between iterations.
    pub idle_timeout: Duration,
    /// First reconnect delay, and the value restored after a connect.
    pub reconnect_min_delay: Duration,
    /// Reconnect delay cap.
    pub reconnect_max_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            io_thread: true,
            idle_timeout: SessionConfig::IDLE_TIMEOUT,
            reconnect_min_delay: SessionConfig::RECONNECT_MIN_DELAY,
            reconnect_max_delay: SessionConfig::RECONNECT_MAX_DELAY,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the background IO thread.
    ///
    /// Without it the caller must drive `poll` and `dispatch_callbacks`.
    pub fn with_io_thread(mut self, enabled: bool) -> Self {
        self.io_thread = enabled;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reconnect backoff bounds. `max` is raised to `min` if smaller.
    pub fn with_reconnect_delay(mut self, min: Duration, max: Duration) -> Self {
        self.reconnect_min_delay = min;
        self.reconnect_max_delay = max.max(min);
        self
    }
}
