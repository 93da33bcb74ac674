//! Application callbacks.

use crate::error::ErrorCode;
use crate::models::user::User;

/// Receives session events from [`RpcClient::dispatch_callbacks`].
///
/// Every method has a no-op default, so implementors only override what they
/// care about. Methods run on whichever thread calls `dispatch_callbacks`:
/// the background I/O thread, or the caller's thread in manual mode.
///
/// [`RpcClient::dispatch_callbacks`]: crate::session::RpcClient::dispatch_callbacks
pub trait EventHandler: Send + Sync {
    /// The companion accepted the handshake.
    fn ready(&self, _user: &User) {}

    /// The connection was lost or closed by the companion.
    fn disconnected(&self, _code: ErrorCode, _message: &str) {}

    /// The companion reported an error for a command. Codes outside the
    /// [`ErrorCode`] table arrive as [`ErrorCode::Unknown`].
    fn errored(&self, _code: ErrorCode, _message: &str) {}

    /// The user accepted an invite; `secret` identifies the game to join.
    fn join_game(&self, _secret: &str) {}

    fn spectate_game(&self, _secret: &str) {}

    /// Someone asked to join. Answer with [`RpcClient::respond`].
    ///
    /// [`RpcClient::respond`]: crate::session::RpcClient::respond
    fn join_request(&self, _user: &User) {}
}
