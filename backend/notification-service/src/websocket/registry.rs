/// WebSocket Connection Registry
///
/// Owns every live gateway connection and the outbound half of its channel.
/// Supports:
/// - Anonymous connections (broadcast only)
/// - Multiple concurrent connections per user
/// - Delivery in registration order
/// - Idempotent removal
use crate::metrics;
use chrono::{DateTime, Utc};
use jwt_security::UserId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Outbound half of a connection; the session actor drains the receiver
pub type OutboundSender = mpsc::UnboundedSender<String>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Entry {
    user_id: Option<UserId>,
    opened_at: DateTime<Utc>,
    sender: OutboundSender,
}

/// Read-only view of a registered connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub user_id: Option<UserId>,
    pub opened_at: DateTime<Utc>,
}

/// Result of writing one frame to a set of connections
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub delivered: usize,
    /// Connections whose receiver was already gone
    pub failed: Vec<ConnectionId>,
}

/// Thread-safe registry of live connections
///
/// `BTreeMap` keyed by the monotonic id keeps iteration in registration order.
/// Mutations take the write lock, sends take the read lock.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<BTreeMap<ConnectionId, Entry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; it becomes addressable by `user_id` when one is given
    pub async fn register(&self, sender: OutboundSender, user_id: Option<UserId>) -> ConnectionId {
        let id = ConnectionId::next();
        let mut connections = self.connections.write().await;

        tracing::debug!(
            connection_id = %id,
            user_id = user_id.as_ref().map(UserId::as_str).unwrap_or("<anonymous>"),
            "Registering connection"
        );

        connections.insert(
            id,
            Entry {
                user_id,
                opened_at: Utc::now(),
                sender,
            },
        );
        metrics::set_websocket_connections(connections.len());
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id).is_some();

        if removed {
            tracing::debug!(connection_id = %id, "Unregistered connection");
            metrics::set_websocket_connections(connections.len());
        }
        removed
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connection_count_for(&self, user_id: &UserId) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|entry| entry.user_id.as_ref() == Some(user_id))
            .count()
    }

    /// Distinct user ids with at least one live connection, sorted
    pub async fn connected_user_ids(&self) -> Vec<UserId> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter_map(|entry| entry.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                id: *id,
                user_id: entry.user_id.clone(),
                opened_at: entry.opened_at,
            })
            .collect()
    }

    /// Write `text` to every connection whose user id satisfies `predicate`
    ///
    /// Writes are fire-and-forget; failures are collected, never retried.
    pub async fn send_where<F>(&self, text: &str, predicate: F) -> SendOutcome
    where
        F: Fn(Option<&UserId>) -> bool,
    {
        let connections = self.connections.read().await;
        let mut outcome = SendOutcome::default();

        for (id, entry) in connections.iter() {
            if !predicate(entry.user_id.as_ref()) {
                continue;
            }
            match entry.sender.send(text.to_owned()) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => outcome.failed.push(*id),
            }
        }

        outcome
    }
}
