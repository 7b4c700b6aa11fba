use super::registry::ConnectionId;
use crate::metrics;
use event_schema::NotificationKind;

/// A notification that could not be written
///
/// Failures never reach the caller of the hub; they are handed to a
/// `DeliveryFailureReporter` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryFailure {
    /// The hub was used before the gateway attached a registry
    HubNotAttached { kind: NotificationKind },
    /// The payload could not be encoded
    Serialization { kind: NotificationKind, error: String },
    /// The connection's receiver was already dropped
    WriteFailed {
        kind: NotificationKind,
        connection_id: ConnectionId,
    },
}

impl DeliveryFailure {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryFailure::HubNotAttached { .. } => "hub_not_attached",
            DeliveryFailure::Serialization { .. } => "serialization",
            DeliveryFailure::WriteFailed { .. } => "write_failed",
        }
    }
}

pub trait DeliveryFailureReporter: Send + Sync {
    fn report(&self, failure: DeliveryFailure);
}

/// Default reporter: a warning log plus the failure counter
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureReporter;

impl DeliveryFailureReporter for TracingFailureReporter {
    fn report(&self, failure: DeliveryFailure) {
        metrics::record_delivery_failure(failure.reason());

        match &failure {
            DeliveryFailure::HubNotAttached { kind } => {
                tracing::warn!(%kind, "Notification dropped: hub has no registry attached");
            }
            DeliveryFailure::Serialization { kind, error } => {
                tracing::warn!(%kind, %error, "Notification dropped: payload not serializable");
            }
            DeliveryFailure::WriteFailed {
                kind,
                connection_id,
            } => {
                tracing::warn!(%kind, %connection_id, "Notification write to closed connection");
            }
        }
    }
}
