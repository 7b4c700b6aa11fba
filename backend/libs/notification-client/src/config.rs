use crate::error::{ClientError, ClientResult};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/websocket";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway URL without the token
    pub endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> ClientResult<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "NOTIFICATION_WS_URL must be a ws:// or wss:// URL, got '{endpoint}'"
            )));
        }
        Ok(Self { endpoint })
    }

    /// Reads `NOTIFICATION_WS_URL` (after loading `.env` if present)
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();
        match std::env::var("NOTIFICATION_WS_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Endpoint with `userToken=<token>` appended
    pub fn connection_url(&self, token: &str) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}userToken={}",
            self.endpoint,
            separator,
            urlencoding::encode(token)
        )
    }
}
