//! Event handler that logs session events and forwards them to the main loop.

use presence_core::{ErrorCode, EventHandler, User};
use std::sync::mpsc::Sender;
use tracing::{info, warn};

/// Events the main loop reacts to.
#[derive(Debug)]
pub enum AppEvent {
    Ready,
    JoinRequest(User),
    Shutdown,
}

pub struct LoggingHandler {
    events: Sender<AppEvent>,
}

impl LoggingHandler {
    pub fn new(events: Sender<AppEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            warn!("Main loop is gone, dropping event");
        }
    }
}

impl EventHandler for LoggingHandler {
    fn ready(&self, user: &User) {
        let name = user.global_name.as_deref().unwrap_or(&user.username);
        info!("Ready: connected as {} ({})", name, user.user_id);
        self.forward(AppEvent::Ready);
    }

    fn disconnected(&self, code: ErrorCode, message: &str) {
        warn!("Disconnected ({}): {}", code, message);
    }

    fn errored(&self, code: ErrorCode, message: &str) {
        warn!("Companion error {}: {}", code, message);
    }

    fn join_game(&self, secret: &str) {
        info!("Join game with secret {}", secret);
    }

    fn spectate_game(&self, secret: &str) {
        info!("Spectate game with secret {}", secret);
    }

    fn join_request(&self, user: &User) {
        info!("Join request from {} ({})", user.username, user.user_id);
        self.forward(AppEvent::JoinRequest(user.clone()));
    }
}
