//! Auth lifecycle binding
//!
//! The socket follows the bearer token: it opens when a token appears and
//! closes when it goes away. A refreshed token does not reconnect; the open
//! socket was authenticated at handshake and stays valid.

use crate::effects::AuthStore;
use crate::manager::ConnectionManager;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Notified after every token change
pub trait TokenObserver: Send + Sync {
    fn token_changed(&self, previous: Option<&str>, current: Option<&str>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    Connect(String),
    Disconnect,
    Stay,
}

/// previous | current | action
/// ---------|---------|--------
/// absent   | present | connect
/// present  | absent  | disconnect
/// present  | present | none (refresh)
/// absent   | absent  | none
pub fn transition(previous: Option<&str>, current: Option<&str>) -> LifecycleAction {
    match (previous, current) {
        (None, Some(token)) => LifecycleAction::Connect(token.to_string()),
        (Some(_), None) => LifecycleAction::Disconnect,
        (Some(_), Some(_)) | (None, None) => LifecycleAction::Stay,
    }
}

/// Drives a `ConnectionManager` from token changes
pub struct SocketLifecycle {
    manager: ConnectionManager,
}

impl SocketLifecycle {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

impl TokenObserver for SocketLifecycle {
    fn token_changed(&self, previous: Option<&str>, current: Option<&str>) {
        match transition(previous, current) {
            LifecycleAction::Connect(token) => self.manager.connect(&token),
            LifecycleAction::Disconnect => self.manager.disconnect(),
            LifecycleAction::Stay => {
                tracing::debug!("Token changed without sign-in/out; socket left as is");
            }
        }
    }
}

/// Holds the bearer token and a single lifecycle observer
///
/// Token changes are serialized: each swap and the observer call for it run
/// under `transitions`, so the observer sees changes in the order they were
/// applied. The observer must not change the token of the store notifying
/// it; that call would block on `transitions`.
pub struct SessionStore {
    token: Mutex<Option<String>>,
    observer: Mutex<Option<Arc<dyn TokenObserver>>>,
    transitions: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
            observer: Mutex::new(None),
            transitions: Mutex::new(()),
        }
    }

    /// Install the observer, replacing any previous one
    ///
    /// If a token is already present the observer sees it as a sign-in.
    pub fn observe(&self, observer: Arc<dyn TokenObserver>) {
        let _transition = lock(&self.transitions);
        *lock(&self.observer) = Some(observer.clone());

        let current = lock(&self.token).clone();
        if let Some(token) = current.as_deref() {
            observer.token_changed(None, Some(token));
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        let _transition = lock(&self.transitions);
        let previous = std::mem::replace(&mut *lock(&self.token), token.clone());
        if previous == token {
            return;
        }

        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer.token_changed(previous.as_deref(), token.as_deref());
        }
    }
}

impl AuthStore for SessionStore {
    fn token(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    fn logout(&self) {
        self.set_token(None);
    }
}

/// Make `manager` follow the token held by `session`
pub fn bind_session(session: &SessionStore, manager: &ConnectionManager) -> Arc<SocketLifecycle> {
    let lifecycle = Arc::new(SocketLifecycle::new(manager.clone()));
    session.observe(lifecycle.clone());
    lifecycle
}
