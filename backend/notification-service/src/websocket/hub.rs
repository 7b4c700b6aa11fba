/// Notification Hub
///
/// Entry point for business logic that wants to push a notification.
/// The hub is created before the gateway exists and is attached to the
/// gateway's registry during setup; calls made before that are dropped.
use super::registry::ConnectionRegistry;
use super::reporter::{DeliveryFailure, DeliveryFailureReporter, TracingFailureReporter};
use crate::metrics;
use event_schema::{
    ActivityPayload, EnquiryPayload, LogoutPayload, NotificationEvent, NotificationKind,
    UserNotificationPayload,
};
use jwt_security::UserId;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Targeted,
    Broadcast,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Targeted => "targeted",
            DeliveryMode::Broadcast => "broadcast",
        }
    }
}

/// Target user ids of a targeted send
///
/// Built from a single id or a list; deserializes from a string or an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct Recipients(Vec<UserId>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(UserId),
    Many(Vec<UserId>),
}

impl From<OneOrMany> for Recipients {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(id) => Recipients(vec![id]),
            OneOrMany::Many(ids) => Recipients(ids),
        }
    }
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

impl From<&str> for Recipients {
    fn from(id: &str) -> Self {
        Recipients(vec![UserId::from(id)])
    }
}

impl From<String> for Recipients {
    fn from(id: String) -> Self {
        Recipients(vec![UserId::from(id)])
    }
}

impl From<UserId> for Recipients {
    fn from(id: UserId) -> Self {
        Recipients(vec![id])
    }
}

impl From<&UserId> for Recipients {
    fn from(id: &UserId) -> Self {
        Recipients(vec![id.clone()])
    }
}

impl<T: Into<UserId>> From<Vec<T>> for Recipients {
    fn from(ids: Vec<T>) -> Self {
        Recipients(ids.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<UserId>> From<&[T]> for Recipients {
    fn from(ids: &[T]) -> Self {
        Recipients(ids.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<UserId>, const N: usize> From<[T; N]> for Recipients {
    fn from(ids: [T; N]) -> Self {
        Recipients(ids.into_iter().map(Into::into).collect())
    }
}

/// Routes typed notifications to registered connections
#[derive(Clone)]
pub struct NotificationHub {
    registry: Arc<OnceCell<ConnectionRegistry>>,
    reporter: Arc<dyn DeliveryFailureReporter>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(TracingFailureReporter))
    }

    pub fn with_reporter(reporter: Arc<dyn DeliveryFailureReporter>) -> Self {
        Self {
            registry: Arc::new(OnceCell::new()),
            reporter,
        }
    }

    /// Bind the hub to the gateway's registry. Only the first call wins.
    pub fn attach(&self, registry: ConnectionRegistry) -> bool {
        let attached = self.registry.set(registry).is_ok();
        if !attached {
            tracing::warn!("NotificationHub already attached; ignoring second registry");
        }
        attached
    }

    pub fn is_attached(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Deliver to every connection owned by one of `recipients`
    ///
    /// Anonymous connections are never matched. Returns the number of
    /// connections written to.
    pub async fn send_to_users(
        &self,
        kind: NotificationKind,
        payload: Value,
        recipients: impl Into<Recipients>,
    ) -> usize {
        let recipients = recipients.into();
        let targets: HashSet<&UserId> = recipients.iter().collect();

        self.deliver(kind, payload, DeliveryMode::Targeted, |user_id| {
            user_id.map_or(false, |id| targets.contains(id))
        })
        .await
    }

    /// Deliver to every registered connection, anonymous ones included
    pub async fn broadcast(&self, kind: NotificationKind, payload: Value) -> usize {
        self.deliver(kind, payload, DeliveryMode::Broadcast, |_| true)
            .await
    }

    pub async fn notify_enquiry(
        &self,
        recipients: impl Into<Recipients>,
        enquiry: EnquiryPayload,
    ) -> usize {
        self.send_typed(NotificationKind::Enquiry, &enquiry, recipients.into())
            .await
    }

    pub async fn notify_activity(
        &self,
        recipients: impl Into<Recipients>,
        activity: ActivityPayload,
    ) -> usize {
        self.send_typed(NotificationKind::Activity, &activity, recipients.into())
            .await
    }

    pub async fn notify_user(
        &self,
        recipients: impl Into<Recipients>,
        notification: UserNotificationPayload,
    ) -> usize {
        self.send_typed(NotificationKind::User, &notification, recipients.into())
            .await
    }

    /// Tell every session of `recipients` to sign out
    pub async fn force_logout(
        &self,
        recipients: impl Into<Recipients>,
        reason: Option<String>,
    ) -> usize {
        let payload = LogoutPayload { reason };
        self.send_typed(NotificationKind::Logout, &payload, recipients.into())
            .await
    }

    async fn send_typed<T: Serialize>(
        &self,
        kind: NotificationKind,
        payload: &T,
        recipients: Recipients,
    ) -> usize {
        match serde_json::to_value(payload) {
            Ok(value) => self.send_to_users(kind, value, recipients).await,
            Err(e) => {
                self.reporter.report(DeliveryFailure::Serialization {
                    kind,
                    error: e.to_string(),
                });
                0
            }
        }
    }

    async fn deliver<F>(
        &self,
        kind: NotificationKind,
        payload: Value,
        mode: DeliveryMode,
        predicate: F,
    ) -> usize
    where
        F: Fn(Option<&UserId>) -> bool,
    {
        let Some(registry) = self.registry.get() else {
            self.reporter
                .report(DeliveryFailure::HubNotAttached { kind });
            return 0;
        };

        let text = match NotificationEvent::new(kind, payload).to_json() {
            Ok(text) => text,
            Err(e) => {
                self.reporter.report(DeliveryFailure::Serialization {
                    kind,
                    error: e.to_string(),
                });
                return 0;
            }
        };

        let outcome = registry.send_where(&text, predicate).await;
        for connection_id in outcome.failed {
            self.reporter.report(DeliveryFailure::WriteFailed {
                kind,
                connection_id,
            });
        }

        metrics::record_deliveries(kind.as_str(), mode.as_str(), outcome.delivered);
        tracing::debug!(
            %kind,
            mode = mode.as_str(),
            delivered = outcome.delivered,
            "Notification dispatched"
        );
        outcome.delivered
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
