//! Session orchestration.
//!
//! [`RpcClient`] owns the [`Connection`], the outbound queues and the
//! one-shot event flags. Callers enqueue presence updates and join replies
//! from any thread; a single consumer (the `presence-io` thread, or the
//! caller in manual mode) runs [`RpcClient::poll`] to keep the connection
//! alive and move bytes, then [`RpcClient::dispatch_callbacks`] to surface
//! events to the [`EventHandler`].
//!
//! # Thread Safety
//!
//! Queues are lock-free and flags are atomics, so producers never block on
//! the I/O loop. All connection access, and therefore every write on the
//! wire, goes through one mutex. Handler methods are never called while that
//! mutex is held.

use crate::backoff::{format_duration, Backoff};
use crate::config::{ProtocolConfig, SessionConfig, SessionOptions};
use crate::connection::{Connection, ConnectionEvents, ConnectionState};
use crate::error::{ErrorCode, FrameError, Result, RpcError, TransportError};
use crate::handler::EventHandler;
use crate::models::message::{self, ErrorPayload, Events};
use crate::models::presence::RichPresence;
use crate::models::user::{JoinReply, JoinRequest, User};
use crate::platform;
use crate::transport::TransportFactory;
use crossbeam::queue::SegQueue;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Builder for configuring and starting an [`RpcClient`].
///
/// # Example
///
/// ```rust,ignore
/// use presence_core::{RpcClient, SessionOptions};
///
/// let client = RpcClient::builder("1234567890")
///     .with_handler(MyHandler)
///     .with_options(SessionOptions::new().with_io_thread(false))
///     .start()?;
/// ```
pub struct SessionBuilder {
    application_id: String,
    handler: Option<Arc<dyn EventHandler>>,
    options: SessionOptions,
    factory: Option<Box<dyn TransportFactory>>,
    pid: Option<u32>,
}

impl SessionBuilder {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            handler: None,
            options: SessionOptions::default(),
            factory: None,
            pid: None,
        }
    }

    /// Register the event handler.
    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Register a handler the caller keeps a reference to.
    pub fn with_shared_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the platform transport, e.g. with a
    /// [`MemoryEndpoint`](crate::transport::MemoryEndpoint) factory.
    pub fn with_transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Process id reported in `SET_ACTIVITY`. Defaults to the current process.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Validate the settings and start the session.
    ///
    /// Fails with [`RpcError::UnsupportedPlatform`] when no transport factory
    /// was given and the platform has no IPC transport.
    pub fn start(self) -> Result<RpcClient> {
        let application_id = self.application_id.trim().to_string();
        if application_id.is_empty() {
            return Err(RpcError::InvalidApplicationId(self.application_id));
        }

        let factory = match self.factory {
            Some(factory) => factory,
            None => platform::default_transport_factory()?,
        };

        let options = self.options;
        let shared = Arc::new(Shared::new(
            self.pid.unwrap_or_else(std::process::id),
            self.handler,
            Backoff::new(options.reconnect_min_delay, options.reconnect_max_delay),
        ));

        let mut connection = Connection::new(application_id.clone(), factory);
        connection.set_events(Some(shared.clone() as Arc<dyn ConnectionEvents>));

        let inner = Arc::new(Inner {
            connection: Mutex::new(connection),
            shared,
        });

        info!(
            "Starting presence session for application {} (io thread: {})",
            application_id, options.io_thread
        );

        let worker = if options.io_thread {
            let worker_inner = inner.clone();
            let idle_timeout = options.idle_timeout;
            let handle = thread::Builder::new()
                .name(SessionConfig::IO_THREAD_NAME.to_string())
                .spawn(move || run_io_loop(worker_inner, idle_timeout))?;
            Some(handle)
        } else {
            None
        };

        Ok(RpcClient {
            inner,
            worker: Mutex::new(worker),
            closed: AtomicBool::new(false),
        })
    }
}

/// Client session with the companion process.
///
/// Dropping the client shuts it down.
pub struct RpcClient {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn builder(application_id: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(application_id)
    }

    /// Start a session with default options and the platform transport.
    pub fn start(
        application_id: impl Into<String>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Result<Self> {
        let mut builder = SessionBuilder::new(application_id);
        builder.handler = handler;
        builder.start()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RpcError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Publish a presence, or clear it with `None`.
    ///
    /// Updates are queued and sent in order once connected. Nothing is
    /// dropped while disconnected.
    pub fn update_presence(&self, presence: Option<&RichPresence>) -> Result<()> {
        self.ensure_open()?;

        let shared = &self.inner.shared;
        let command = message::set_activity(shared.next_nonce(), shared.pid, presence);
        let bytes = command.to_string().into_bytes();

        if bytes.len() > ProtocolConfig::MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                len: bytes.len(),
                max: ProtocolConfig::MAX_PAYLOAD_SIZE,
            }
            .into());
        }

        shared.presence_queue.push(bytes);
        shared.wake();
        Ok(())
    }

    pub fn clear_presence(&self) -> Result<()> {
        self.update_presence(None)
    }

    /// Answer a join request. Only valid while connected.
    pub fn respond(&self, user: &User, reply: JoinReply) -> Result<()> {
        self.ensure_open()?;

        if !self.inner.connection.lock().is_open() {
            return Err(RpcError::NotConnected);
        }

        let shared = &self.inner.shared;
        let command = message::join_reply(shared.next_nonce(), &user.user_id, reply);
        debug!("Queued {:?} for user {}", reply, user.user_id);
        shared.command_queue.push(command.to_string().into_bytes());
        shared.wake();
        Ok(())
    }

    /// Replace (or remove) the event handler.
    pub fn set_handler(&self, handler: Option<Arc<dyn EventHandler>>) -> Result<()> {
        self.ensure_open()?;
        *self.inner.shared.handler.write() = handler;
        Ok(())
    }

    /// Run one polling step. Only needed when the I/O thread is disabled.
    pub fn poll(&self) -> Result<()> {
        self.poll_at(Instant::now())
    }

    /// Run one polling step as if the current time were `now`.
    pub fn poll_at(&self, now: Instant) -> Result<()> {
        self.ensure_open()?;
        self.inner.poll_at(now);
        Ok(())
    }

    /// Deliver pending events to the handler.
    pub fn dispatch_callbacks(&self) -> Result<()> {
        self.ensure_open()?;
        self.inner.dispatch_callbacks();
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.lock().state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.lock().is_open()
    }

    /// Why the most recent attempt to reach the companion failed, if it did.
    pub fn last_transport_error(&self) -> Option<TransportError> {
        self.inner.connection.lock().last_transport_error().cloned()
    }

    /// Cause of the most recent disconnect.
    pub fn last_disconnect(&self) -> (ErrorCode, String) {
        self.inner.shared.last_disconnect.lock().clone()
    }

    /// Code and message of the most recent `ERROR` event.
    pub fn last_error(&self) -> (ErrorCode, String) {
        self.inner.shared.last_error.lock().clone()
    }

    /// Stop the session.
    ///
    /// Clears the handler, stops and joins the I/O thread, then closes the
    /// connection. Later calls on this client fail with
    /// [`RpcError::SessionClosed`]. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let shared = &self.inner.shared;
        *shared.handler.write() = None;
        self.inner.connection.lock().set_events(None);
        shared.running.store(false, Ordering::SeqCst);
        shared.wake();

        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() == thread::current().id() {
                debug!("Shutdown requested from the I/O thread, not joining");
            } else if handle.join().is_err() {
                warn!("I/O thread panicked");
            }
        }

        self.inner.connection.lock().close();
        info!("Presence session shut down");
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_io_loop(inner: Arc<Inner>, idle_timeout: Duration) {
    debug!("I/O thread started");

    while inner.shared.running.load(Ordering::SeqCst) {
        inner.poll_at(Instant::now());
        inner.dispatch_callbacks();
        inner.shared.wait(idle_timeout);
    }

    debug!("I/O thread stopped");
}

struct Inner {
    connection: Mutex<Connection>,
    shared: Arc<Shared>,
}

impl Inner {
    fn poll_at(&self, now: Instant) {
        let shared = &self.shared;
        let mut connection = self.connection.lock();

        // A hang-up seen outside a read still goes through close and backoff.
        if connection.close_if_severed() {
            return;
        }

        if !connection.is_open() {
            if !shared.reconnect_due(now) {
                return;
            }

            let delay = shared.schedule_reconnect(now);
            debug!("Connect attempt; next attempt in {}", format_duration(delay));

            if let Err(e) = connection.open() {
                debug!("Connect attempt failed: {}", e);
            }

            if !connection.is_open() {
                return;
            }
        }

        while let Ok(message) = connection.read(false) {
            shared.handle_message(&message);
        }

        // Presence updates keep their order: a failed write leaves it and
        // everything after it queued for the next connection.
        let mut head = shared.presence_head.lock();
        while let Some(bytes) = head.take().or_else(|| shared.presence_queue.pop()) {
            if let Err(e) = connection.write(&bytes) {
                debug!("Presence update held back: {}", e);
                *head = Some(bytes);
                break;
            }
        }
        drop(head);

        while let Some(bytes) = shared.command_queue.pop() {
            if let Err(e) = connection.write(&bytes) {
                debug!("Dropped command: {}", e);
            }
        }
    }

    fn dispatch_callbacks(&self) {
        let shared = &self.shared;

        let handler = shared.handler.read().clone();
        let Some(handler) = handler else {
            while shared.join_requests.pop().is_some() {}
            return;
        };

        let connected = self.connection.lock().is_open();

        if connected && shared.just_disconnected.swap(false, Ordering::SeqCst) {
            let (code, message) = shared.last_disconnect.lock().clone();
            handler.disconnected(code, &message);
        }

        if shared.just_connected.swap(false, Ordering::SeqCst) {
            let user = shared.connected_user.lock().clone();
            handler.ready(&user);
        }

        if shared.got_error.swap(false, Ordering::SeqCst) {
            let (code, message) = shared.last_error.lock().clone();
            handler.errored(code, &message);
        }

        if shared.join_approved.swap(false, Ordering::SeqCst) {
            let secret = shared.join_secret.lock().clone();
            handler.join_game(&secret);
        }

        if shared.spectate_approved.swap(false, Ordering::SeqCst) {
            let secret = shared.spectate_secret.lock().clone();
            handler.spectate_game(&secret);
        }

        while let Some(request) = shared.join_requests.pop() {
            handler.join_request(&request.user);
        }

        if !connected && shared.just_disconnected.swap(false, Ordering::SeqCst) {
            let (code, message) = shared.last_disconnect.lock().clone();
            handler.disconnected(code, &message);
        }
    }
}

struct Reconnect {
    backoff: Backoff,
    next_connect: Instant,
}

/// State shared between producers, the I/O loop and connection callbacks.
struct Shared {
    pid: u32,
    nonce: AtomicU64,
    handler: RwLock<Option<Arc<dyn EventHandler>>>,
    running: AtomicBool,

    just_connected: AtomicBool,
    just_disconnected: AtomicBool,
    got_error: AtomicBool,
    join_approved: AtomicBool,
    spectate_approved: AtomicBool,

    connected_user: Mutex<User>,
    join_secret: Mutex<String>,
    spectate_secret: Mutex<String>,
    last_error: Mutex<(ErrorCode, String)>,
    last_disconnect: Mutex<(ErrorCode, String)>,

    presence_queue: SegQueue<Vec<u8>>,
    /// Presence update whose write failed; sent before anything in the queue.
    presence_head: Mutex<Option<Vec<u8>>>,
    command_queue: SegQueue<Vec<u8>>,
    join_requests: SegQueue<JoinRequest>,

    reconnect: Mutex<Reconnect>,
    wake_pending: Mutex<bool>,
    wake_signal: Condvar,
}

impl Shared {
    fn new(pid: u32, handler: Option<Arc<dyn EventHandler>>, backoff: Backoff) -> Self {
        Self {
            pid,
            nonce: AtomicU64::new(1),
            handler: RwLock::new(handler),
            running: AtomicBool::new(true),
            just_connected: AtomicBool::new(false),
            just_disconnected: AtomicBool::new(false),
            got_error: AtomicBool::new(false),
            join_approved: AtomicBool::new(false),
            spectate_approved: AtomicBool::new(false),
            connected_user: Mutex::new(User::default()),
            join_secret: Mutex::new(String::new()),
            spectate_secret: Mutex::new(String::new()),
            last_error: Mutex::new((ErrorCode::Success, String::new())),
            last_disconnect: Mutex::new((ErrorCode::Success, String::new())),
            presence_queue: SegQueue::new(),
            presence_head: Mutex::new(None),
            command_queue: SegQueue::new(),
            join_requests: SegQueue::new(),
            reconnect: Mutex::new(Reconnect {
                backoff,
                next_connect: Instant::now(),
            }),
            wake_pending: Mutex::new(false),
            wake_signal: Condvar::new(),
        }
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    fn wake(&self) {
        let mut pending = self.wake_pending.lock();
        *pending = true;
        self.wake_signal.notify_one();
    }

    fn wait(&self, timeout: Duration) {
        let mut pending = self.wake_pending.lock();
        if !*pending {
            self.wake_signal.wait_for(&mut pending, timeout);
        }
        *pending = false;
    }

    fn reconnect_due(&self, now: Instant) -> bool {
        now >= self.reconnect.lock().next_connect
    }

    fn schedule_reconnect(&self, now: Instant) -> Duration {
        let mut reconnect = self.reconnect.lock();
        let delay = reconnect.backoff.next_delay();
        reconnect.next_connect = now + delay;
        delay
    }

    fn handle_message(&self, message: &message::Message) {
        let evt = message.evt().unwrap_or_default();

        if message.nonce().is_some() {
            if evt == Events::ERROR {
                let payload = message
                    .data()
                    .map(ErrorPayload::from_value)
                    .unwrap_or_default();
                let raw = payload.code.unwrap_or_default();
                let text = payload.message.unwrap_or_default();

                warn!("Companion reported error {}: {}", raw, text);
                *self.last_error.lock() = (ErrorCode::from_code(raw), text);
                self.got_error.store(true, Ordering::SeqCst);
            }
            return;
        }

        match evt {
            Events::ACTIVITY_JOIN => {
                if let Some(secret) = message.data_str("secret") {
                    *self.join_secret.lock() = secret.to_string();
                    self.join_approved.store(true, Ordering::SeqCst);
                }
            }
            Events::ACTIVITY_SPECTATE => {
                if let Some(secret) = message.data_str("secret") {
                    *self.spectate_secret.lock() = secret.to_string();
                    self.spectate_approved.store(true, Ordering::SeqCst);
                }
            }
            Events::ACTIVITY_JOIN_REQUEST => {
                let user = message
                    .data()
                    .and_then(|data| data.get("user"))
                    .and_then(|user| User::from_value(user).ok());

                match user {
                    Some(_) if self.handler.read().is_none() => {
                        debug!("Join request with no handler registered, dropped")
                    }
                    Some(user) => {
                        debug!("Join request from user {}", user.user_id);
                        self.join_requests.push(JoinRequest { user });
                    }
                    None => debug!("Join request without a user record"),
                }
            }
            other => debug!("Ignoring event {:?}", other),
        }
    }
}

impl ConnectionEvents for Shared {
    fn on_connected(&self, user: &User) {
        *self.connected_user.lock() = user.clone();
        self.just_connected.store(true, Ordering::SeqCst);
        self.reconnect.lock().backoff.reset();

        if self.handler.read().is_some() {
            for evt in Events::SUBSCRIBED {
                let command = message::subscribe(self.next_nonce(), evt);
                self.command_queue.push(command.to_string().into_bytes());
            }
        }
    }

    fn on_disconnected(&self, code: ErrorCode, message: &str) {
        *self.last_disconnect.lock() = (code, message.to_string());
        self.just_disconnected.store(true, Ordering::SeqCst);

        let delay = self.schedule_reconnect(Instant::now());
        info!(
            "Disconnected ({}): {}; reconnecting in {}",
            code,
            message,
            format_duration(delay)
        );
    }
}
