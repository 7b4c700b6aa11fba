/// Client → server frames
///
/// Clients send nothing the gateway acts on. Frames are parsed only so the
/// debug log shows structured JSON when there is some.
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Json(Value),
    Text(String),
}

impl InboundFrame {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => InboundFrame::Json(value),
            Err(_) => InboundFrame::Text(raw.to_owned()),
        }
    }
}
