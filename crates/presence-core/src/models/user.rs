//! User records delivered by the companion.

use serde::{Deserialize, Serialize};

/// A user as reported in `READY` and `ACTIVITY_JOIN_REQUEST` events.
///
/// Only the fields the client needs are kept. The id is accepted under either
/// `userId` or `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userId", alias = "id", default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Decode a user record from an event payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        User::deserialize(value)
    }
}

/// Someone asking to join the current activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub user: User,
}

/// Answer to a [`JoinRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Accept,
    Decline,
}
