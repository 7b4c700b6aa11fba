//! Notification dispatcher
//!
//! Subscribes to a `ConnectionManager` and runs the effect for each newly
//! arrived notification exactly once. Arrivals are keyed by their position in
//! the message log, so status-only snapshots and repeated snapshots of the
//! same log never re-dispatch, even when two messages carry identical text.

use crate::effects::{AuthStore, CachePartition, EnquiryStore, QueryCache, Severity, Toaster};
use crate::manager::{ConnectionManager, ConnectionSnapshot, Subscription};
use event_schema::{
    ActivityPayload, EnquiryPayload, InboundMessage, NotificationEvent, NotificationKind,
    UserNotificationPayload,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

const ACTIVITY_FALLBACK: &str = "You have a new activity";
const ENQUIRY_FALLBACK: &str = "You have a new enquiry";
const USER_FALLBACK: &str = "You have a new notification";
const LOGOUT_MESSAGE: &str = "You have been logged out";

#[derive(Clone)]
pub struct NotificationEffects {
    pub auth: Arc<dyn AuthStore>,
    pub cache: Arc<dyn QueryCache>,
    pub toaster: Arc<dyn Toaster>,
    pub enquiries: Arc<dyn EnquiryStore>,
}

pub struct NotificationDispatcher {
    effects: NotificationEffects,
    /// Arrival sequence number of the last handled log entry
    last_seen: Mutex<usize>,
}

/// Lenient payload decode: a missing or malformed payload yields defaults
fn decode<T: serde::de::DeserializeOwned + Default>(payload: &Value) -> T {
    T::deserialize(payload).unwrap_or_default()
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

impl NotificationDispatcher {
    pub fn new(effects: NotificationEffects) -> Arc<Self> {
        Arc::new(Self {
            effects,
            last_seen: Mutex::new(0),
        })
    }

    /// Start reacting to `manager`
    ///
    /// Messages already in the log are treated as handled; only later
    /// arrivals are dispatched.
    pub fn attach(self: &Arc<Self>, manager: &ConnectionManager) -> Subscription {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = manager.message_count();

        let dispatcher = Arc::clone(self);
        manager.subscribe(move |snapshot| dispatcher.on_snapshot(snapshot))
    }

    fn on_snapshot(&self, snapshot: &ConnectionSnapshot) {
        let raw = {
            let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if snapshot.message_count <= *last_seen {
                return;
            }
            if snapshot.message_count > *last_seen + 1 {
                tracing::warn!(
                    skipped = snapshot.message_count - *last_seen - 1,
                    "Dispatcher fell behind the message log; only the newest entry is handled"
                );
            }
            *last_seen = snapshot.message_count;
            snapshot.latest.clone()
        };

        // Effects may call back into the manager (logout disconnects), so the
        // lock above is released first.
        if let Some(raw) = raw {
            self.handle_raw(&raw);
        }
    }

    /// Classify one raw message and dispatch it if it is a notification
    pub fn handle_raw(&self, raw: &str) {
        if let InboundMessage::Notification(event) = InboundMessage::classify(raw) {
            self.dispatch(&event);
        }
    }

    pub fn dispatch(&self, event: &NotificationEvent) {
        let effects = &self.effects;

        match event.kind() {
            NotificationKind::Activity => {
                let activity: ActivityPayload = decode(event.payload());
                effects.cache.invalidate(CachePartition::UserActivities);
                let message = non_empty(activity.description)
                    .unwrap_or_else(|| ACTIVITY_FALLBACK.to_string());
                effects.toaster.toast(Severity::Info, &message);
            }
            NotificationKind::Enquiry => {
                let enquiry: EnquiryPayload = decode(event.payload());
                let message = non_empty(enquiry.title.clone())
                    .unwrap_or_else(|| ENQUIRY_FALLBACK.to_string());
                effects.enquiries.merge(enquiry);
                effects.cache.invalidate(CachePartition::Enquiries);
                effects.toaster.toast(Severity::Info, &message);
            }
            NotificationKind::User => {
                let notification: UserNotificationPayload = decode(event.payload());
                effects.cache.invalidate(CachePartition::UserNotifications);
                let message = non_empty(notification.message)
                    .unwrap_or_else(|| USER_FALLBACK.to_string());
                effects.toaster.toast(Severity::Info, &message);
            }
            NotificationKind::Logout => {
                if !effects.auth.is_authenticated() {
                    tracing::debug!("Logout notification while signed out; ignored");
                    return;
                }
                tracing::info!("Forced logout requested by server");
                effects.auth.logout();
                effects.cache.clear();
                effects.toaster.toast(Severity::Warning, LOGOUT_MESSAGE);
            }
        }
    }
}
