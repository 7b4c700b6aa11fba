use crate::config::WebSocketConfig;
use crate::websocket::{ConnectionRegistry, NotificationHub};
use jwt_security::TokenIdentity;
use std::sync::Arc;

/// Shared application state handed to every actix worker
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub hub: NotificationHub,
    pub identity: Arc<dyn TokenIdentity>,
    pub websocket: WebSocketConfig,
}

impl AppState {
    /// Create the gateway registry and attach `hub` to it
    pub fn new(
        hub: NotificationHub,
        identity: Arc<dyn TokenIdentity>,
        websocket: WebSocketConfig,
    ) -> Self {
        let registry = ConnectionRegistry::new();
        hub.attach(registry.clone());

        Self {
            registry,
            hub,
            identity,
            websocket,
        }
    }
}
