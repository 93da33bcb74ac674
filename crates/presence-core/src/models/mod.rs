//! Data models exchanged with the companion process.

pub mod message;
pub mod presence;
pub mod user;

pub use message::{Commands, ErrorPayload, Events, Message};
pub use presence::{ActivityType, Button, PartyPrivacy, RichPresence};
pub use user::{JoinReply, JoinRequest, User};
