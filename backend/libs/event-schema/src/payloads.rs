use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Payloads are lenient: every field is optional and anything the schema does
// not name is kept in `extra`, so producers can add fields without breaking
// older clients.

/// Payload of an `ACTIVITY` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of an `ENQUIRY` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnquiryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnquiryPayload {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            extra: Map::new(),
        }
    }

    /// Overlay `newer` on top of `self`; fields absent in `newer` are kept.
    pub fn merge_from(&mut self, newer: EnquiryPayload) {
        if newer.id.is_some() {
            self.id = newer.id;
        }
        if newer.title.is_some() {
            self.title = newer.title;
        }
        self.extra.extend(newer.extra);
    }
}

/// Payload of a `USER` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserNotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `USER_LOGOUT` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoutPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
