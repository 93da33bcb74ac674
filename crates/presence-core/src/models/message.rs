//! JSON messages carried in frame payloads.
//!
//! Inbound messages are kept as a loose JSON object because the companion
//! adds fields freely; the client only looks at `cmd`, `evt`, `nonce` and
//! `data`. Outbound commands are built with the helpers at the bottom.

use crate::config::ProtocolConfig;
use crate::models::presence::RichPresence;
use crate::models::user::JoinReply;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Command names.
pub struct Commands;

impl Commands {
    pub const DISPATCH: &'static str = "DISPATCH";
    pub const SET_ACTIVITY: &'static str = "SET_ACTIVITY";
    pub const SUBSCRIBE: &'static str = "SUBSCRIBE";
    pub const SEND_ACTIVITY_JOIN_INVITE: &'static str = "SEND_ACTIVITY_JOIN_INVITE";
    pub const CLOSE_ACTIVITY_JOIN_REQUEST: &'static str = "CLOSE_ACTIVITY_JOIN_REQUEST";
}

/// Event names.
pub struct Events;

impl Events {
    pub const READY: &'static str = "READY";
    pub const ERROR: &'static str = "ERROR";
    pub const ACTIVITY_JOIN: &'static str = "ACTIVITY_JOIN";
    pub const ACTIVITY_SPECTATE: &'static str = "ACTIVITY_SPECTATE";
    pub const ACTIVITY_JOIN_REQUEST: &'static str = "ACTIVITY_JOIN_REQUEST";

    /// Events subscribed to after every successful connect.
    pub const SUBSCRIBED: [&'static str; 3] = [
        Self::ACTIVITY_JOIN,
        Self::ACTIVITY_SPECTATE,
        Self::ACTIVITY_JOIN_REQUEST,
    ];
}

/// A decoded JSON object from a frame payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message(Map<String, Value>);

impl Message {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a payload. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self(fields))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn cmd(&self) -> Option<&str> {
        self.get("cmd").and_then(Value::as_str)
    }

    pub fn evt(&self) -> Option<&str> {
        self.get("evt").and_then(Value::as_str)
    }

    /// The nonce, if present and non-null. Numbers are rendered as text.
    pub fn nonce(&self) -> Option<String> {
        match self.get("nonce")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.get("data")
    }

    /// A `data.<key>` string field.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data().and_then(|d| d.get(key)).and_then(Value::as_str)
    }

    pub fn is_event(&self, evt: &str) -> bool {
        self.evt() == Some(evt)
    }
}

/// `code` and `message` fields of a `CLOSE` frame or `ERROR` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    /// Read from a JSON object, ignoring fields of the wrong type.
    pub fn from_value(value: &Value) -> Self {
        Self {
            code: value.get("code").and_then(Value::as_i64),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Handshake sent right after the transport opens.
pub fn handshake(client_id: &str) -> Value {
    json!({
        "v": ProtocolConfig::VERSION,
        "client_id": client_id,
    })
}

/// Subscribe to one event.
pub fn subscribe(nonce: u64, evt: &str) -> Value {
    json!({
        "nonce": nonce.to_string(),
        "cmd": Commands::SUBSCRIBE,
        "evt": evt,
    })
}

/// Set the activity of process `pid`. `None` sends an empty presence.
pub fn set_activity(nonce: u64, pid: u32, presence: Option<&RichPresence>) -> Value {
    let activity = match presence {
        Some(presence) => presence.to_activity(),
        None => RichPresence::default().to_activity(),
    };

    json!({
        "nonce": nonce.to_string(),
        "cmd": Commands::SET_ACTIVITY,
        "args": { "pid": pid, "activity": activity },
    })
}

/// Accept or decline a join request from `user_id`.
pub fn join_reply(nonce: u64, user_id: &str, reply: JoinReply) -> Value {
    let cmd = match reply {
        JoinReply::Accept => Commands::SEND_ACTIVITY_JOIN_INVITE,
        JoinReply::Decline => Commands::CLOSE_ACTIVITY_JOIN_REQUEST,
    };

    json!({
        "nonce": nonce.to_string(),
        "cmd": cmd,
        "args": { "user_id": user_id },
    })
}
