/// Client connection manager
///
/// Holds at most one live transport, the connection status and an ordered
/// log of every raw message received. Subscribers get a snapshot on every
/// status or log change.
///
/// Each opened socket is driven by its own task and tagged with a generation
/// number. Events from a socket that is no longer current are dropped, so a
/// `disconnect()` racing an in-flight open always wins.
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::Connector;
use event_schema::InboundMessage;
use futures_util::{SinkExt, StreamExt};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What subscribers see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    /// Length of the message log; doubles as the arrival sequence number of
    /// `latest`
    pub message_count: usize,
    pub latest: Option<String>,
}

type Listener = Arc<dyn Fn(&ConnectionSnapshot) + Send + Sync>;

enum Command {
    Send(String),
    Close,
}

struct SocketHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

struct State {
    status: ConnectionStatus,
    generation: u64,
    socket: Option<SocketHandle>,
    messages: Vec<String>,
}

impl State {
    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .map_or(false, |socket| socket.generation == generation)
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            message_count: self.messages.len(),
            latest: self.messages.last().cloned(),
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Snapshots waiting to be delivered, in the order their changes were made
#[derive(Default)]
struct Outbox {
    pending: VecDeque<ConnectionSnapshot>,
    draining: bool,
}

struct Shared {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<State>,
    listeners: Mutex<Listeners>,
    outbox: Mutex<Outbox>,
}

/// Clears the draining flag if a listener panics mid-drain
struct DrainGuard<'a> {
    outbox: &'a Mutex<Outbox>,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock(self.outbox).draining = false;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Queue the snapshot of a change. Called with the state lock held so
    /// queue order is mutation order.
    fn publish(&self, state: &State) {
        lock(&self.outbox).pending.push_back(state.snapshot());
    }

    /// Deliver queued snapshots to every listener with no lock held
    ///
    /// Only one caller drains at a time. Changes made by a listener, or on
    /// another thread meanwhile, are queued and delivered by the active
    /// drainer after the snapshot in hand, so every listener sees every
    /// change exactly once and in order.
    fn flush(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let mut guard = DrainGuard {
            outbox: &self.outbox,
            finished: false,
        };

        loop {
            let snapshot = {
                let mut outbox = lock(&self.outbox);
                match outbox.pending.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        // Stop draining under the same lock that saw the
                        // queue empty, so no snapshot is stranded
                        outbox.draining = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            let listeners: Vec<Listener> =
                lock(&self.listeners).entries.values().cloned().collect();
            for listener in listeners {
                listener(&snapshot);
            }
        }
    }

    fn on_open(&self, generation: u64) -> bool {
        {
            let mut state = self.state();
            if !state.is_current(generation) {
                return false;
            }
            state.status = ConnectionStatus::Connected;
            self.publish(&state);
        }
        tracing::info!(generation, "Notification socket connected");
        self.flush();
        true
    }

    fn on_message(&self, generation: u64, text: String) {
        {
            let mut state = self.state();
            if !state.is_current(generation) {
                tracing::debug!(generation, "Dropping message from stale socket");
                return;
            }

            match InboundMessage::classify(&text) {
                InboundMessage::Notification(event) => {
                    tracing::debug!(kind = %event.kind(), "Notification received");
                }
                InboundMessage::Unrecognized { tag, .. } => {
                    tracing::error!(tag = %tag, "Unrecognized notification type");
                }
                InboundMessage::Json(_) | InboundMessage::Text(_) => {
                    tracing::debug!(message = %text, "Non-notification message received");
                }
            }

            state.messages.push(text);
            self.publish(&state);
        }
        self.flush();
    }

    fn on_close(&self, generation: u64) {
        self.finish(generation, ConnectionStatus::Disconnected);
    }

    fn on_error(&self, generation: u64, error: &dyn std::error::Error) {
        tracing::warn!(generation, %error, "Notification socket failed");
        self.finish(generation, ConnectionStatus::Error);
    }

    fn finish(&self, generation: u64, status: ConnectionStatus) {
        {
            let mut state = self.state();
            if !state.is_current(generation) {
                return;
            }
            state.socket = None;
            state.status = status;
            self.publish(&state);
        }
        self.flush();
    }
}

/// Shared handle to the process-wide notification connection
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                state: Mutex::new(State {
                    status: ConnectionStatus::Disconnected,
                    generation: 0,
                    socket: None,
                    messages: Vec::new(),
                }),
                listeners: Mutex::new(Listeners::default()),
                outbox: Mutex::new(Outbox::default()),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state().status
    }

    /// Copy of the full message log in arrival order
    pub fn messages(&self) -> Vec<String> {
        self.shared.state().messages.clone()
    }

    pub fn latest_message(&self) -> Option<String> {
        self.shared.state().messages.last().cloned()
    }

    pub fn message_count(&self) -> usize {
        self.shared.state().messages.len()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.shared.state().snapshot()
    }

    /// Open a socket authenticated with `token`
    ///
    /// No-op while connecting or connected. Failures are reported through the
    /// status (`Error`), never retried. Must be called from within a Tokio
    /// runtime.
    pub fn connect(&self, token: &str) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "connect() called outside a Tokio runtime");
                self.set_status(ConnectionStatus::Error);
                return;
            }
        };

        let (generation, commands) = {
            let mut state = self.shared.state();
            if matches!(
                state.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            ) {
                tracing::debug!(status = ?state.status, "connect() ignored, socket already active");
                return;
            }

            state.generation += 1;
            let generation = state.generation;
            let (tx, rx) = mpsc::unbounded_channel();
            state.socket = Some(SocketHandle {
                generation,
                commands: tx,
            });
            state.status = ConnectionStatus::Connecting;
            self.shared.publish(&state);
            (generation, rx)
        };
        self.shared.flush();

        let url = self.shared.config.connection_url(token);
        runtime.spawn(run_socket(self.shared.clone(), generation, url, commands));
    }

    /// Close the active socket, if any. Idempotent.
    pub fn disconnect(&self) {
        let changed = {
            let mut state = self.shared.state();
            if let Some(socket) = state.socket.take() {
                let _ = socket.commands.send(Command::Close);
            }
            let changed = state.status != ConnectionStatus::Disconnected;
            state.status = ConnectionStatus::Disconnected;
            if changed {
                self.shared.publish(&state);
            }
            changed
        };

        if changed {
            tracing::info!("Notification socket disconnected");
            self.shared.flush();
        }
    }

    /// Write a text frame. Only allowed while `Connected`.
    pub fn send(&self, message: impl Into<String>) -> ClientResult<()> {
        let state = self.shared.state();
        match (&state.status, &state.socket) {
            (ConnectionStatus::Connected, Some(socket)) => socket
                .commands
                .send(Command::Send(message.into()))
                .map_err(|_| ClientError::NotOpen),
            (status, _) => {
                tracing::warn!(?status, "send() while socket is not open; message dropped");
                Err(ClientError::NotOpen)
            }
        }
    }

    /// Register a listener; it is removed when the returned handle is dropped
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionSnapshot) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.shared.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));

        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.listeners).entries.len()
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = {
            let mut state = self.shared.state();
            let changed = state.status != status;
            state.status = status;
            if changed {
                self.shared.publish(&state);
            }
            changed
        };
        if changed {
            self.shared.flush();
        }
    }
}

/// Listener registration; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners).entries.remove(&self.id);
        }
    }
}

async fn run_socket(
    shared: Arc<Shared>,
    generation: u64,
    url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut transport = match shared.connector.connect(&url).await {
        Ok(transport) => transport,
        Err(e) => {
            shared.on_error(generation, &e);
            return;
        }
    };

    if !shared.on_open(generation) {
        tracing::debug!(generation, "Socket opened after disconnect; closing it");
        let _ = transport.sink.close().await;
        return;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = transport.sink.send(text).await {
                        shared.on_error(generation, &e);
                        return;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = transport.sink.close().await;
                    return;
                }
            },
            frame = transport.stream.next() => match frame {
                Some(Ok(text)) => shared.on_message(generation, text),
                Some(Err(e)) => {
                    shared.on_error(generation, &e);
                    return;
                }
                None => {
                    shared.on_close(generation);
                    return;
                }
            },
        }
    }
}
