/// Wire schema for real-time notifications
///
/// Every server→client websocket frame is a JSON object of the form
/// `{"type": "<KIND>", "payload": {...}}`. The notification service and the
/// client crate both depend on this crate so the tag strings live in one place.
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod payloads;

pub use payloads::{ActivityPayload, EnquiryPayload, LogoutPayload, UserNotificationPayload};

/// Notification kinds carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "ACTIVITY")]
    Activity,
    #[serde(rename = "ENQUIRY")]
    Enquiry,
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "USER_LOGOUT")]
    Logout,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Activity,
        NotificationKind::Enquiry,
        NotificationKind::User,
        NotificationKind::Logout,
    ];

    /// Tag used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Activity => "ACTIVITY",
            NotificationKind::Enquiry => "ENQUIRY",
            NotificationKind::User => "USER",
            NotificationKind::Logout => "USER_LOGOUT",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed notification as it travels over the websocket
///
/// Immutable once built; fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    kind: NotificationKind,
    #[serde(default)]
    payload: Value,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Build an event from any serializable payload
    pub fn with_payload<T: Serialize>(
        kind: NotificationKind,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decode the payload into one of the typed payload structs
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Serialize to the wire format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Classification of a raw inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// JSON object whose `type` is a known notification kind
    Notification(NotificationEvent),
    /// JSON object with a string `type` this schema does not know
    Unrecognized { tag: String, value: Value },
    /// Valid JSON without a usable `type` discriminant
    Json(Value),
    /// Not JSON at all
    Text(String),
}

impl InboundMessage {
    /// Never fails: anything that is not a notification degrades to
    /// `Json` or `Text`.
    pub fn classify(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => return InboundMessage::Text(raw.to_owned()),
        };

        let tag = match value.get("type").and_then(Value::as_str) {
            Some(tag) => tag.to_owned(),
            None => return InboundMessage::Json(value),
        };

        match NotificationKind::from_tag(&tag) {
            Some(kind) => {
                let payload = value.get("payload").cloned().unwrap_or(Value::Null);
                InboundMessage::Notification(NotificationEvent::new(kind, payload))
            }
            None => InboundMessage::Unrecognized { tag, value },
        }
    }
}
