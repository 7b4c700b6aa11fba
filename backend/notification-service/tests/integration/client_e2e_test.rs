use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_schema::EnquiryPayload;
use jwt_security::{JwtIdentity, UserId};
use notification_client::{
    bind_session, AuthStore, ClientConfig, ConnectionManager, ConnectionStatus,
    InMemoryEnquiryStore, InMemoryQueryCache, NotificationDispatcher, NotificationEffects,
    SessionStore, Severity, Toaster, TungsteniteConnector,
};
use notification_service::WebSocketConfig;

use super::support::{eventually, start_gateway, test_state, wait_for};

const SECRET: &str = "integration-test-secret-with-enough-entropy-9f3k";

#[derive(Default)]
struct RecordingToaster {
    toasts: Mutex<Vec<(Severity, String)>>,
}

impl Toaster for RecordingToaster {
    fn toast(&self, severity: Severity, message: &str) {
        self.toasts
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

#[actix_rt::test]
async fn client_follows_server_notifications_until_forced_logout() {
    let identity = Arc::new(JwtIdentity::from_secret(SECRET).unwrap());
    let user = UserId::from("user-42");
    let token = identity
        .issue(&user, chrono::Duration::minutes(5))
        .unwrap();

    let state = test_state(identity, WebSocketConfig::default());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    let config = ClientConfig::new(format!("ws://{addr}/websocket")).unwrap();
    let manager = ConnectionManager::new(config, Arc::new(TungsteniteConnector));
    let session = Arc::new(SessionStore::new(None));
    let cache = Arc::new(InMemoryQueryCache::new());
    let toaster = Arc::new(RecordingToaster::default());
    let enquiries = Arc::new(InMemoryEnquiryStore::new());

    let dispatcher = NotificationDispatcher::new(NotificationEffects {
        auth: session.clone(),
        cache: cache.clone(),
        toaster: toaster.clone(),
        enquiries: enquiries.clone(),
    });
    let _subscription = dispatcher.attach(&manager);
    bind_session(&session, &manager);

    // Sign-in opens the socket
    session.set_token(Some(token));
    wait_for(Duration::from_secs(5), || {
        manager.status() == ConnectionStatus::Connected
    })
    .await;

    let registry = state.registry.clone();
    let expected = user.clone();
    eventually(Duration::from_secs(5), || {
        let registry = registry.clone();
        let expected = expected.clone();
        async move { registry.connected_user_ids().await == vec![expected] }
    })
    .await;

    let delivered = state
        .hub
        .notify_enquiry(&user, EnquiryPayload::new("e1", "Is parking included?"))
        .await;
    assert_eq!(delivered, 1);
    wait_for(Duration::from_secs(5), || enquiries.get("e1").is_some()).await;

    state
        .hub
        .force_logout(&user, Some("session revoked".into()))
        .await;
    wait_for(Duration::from_secs(5), || {
        manager.status() == ConnectionStatus::Disconnected
    })
    .await;

    assert!(!session.is_authenticated());
    assert_eq!(cache.clear_count(), 1);
    let toasts = toaster.toasts.lock().unwrap().clone();
    assert_eq!(
        toasts,
        vec![
            (Severity::Info, "Is parking included?".to_string()),
            (Severity::Warning, "You have been logged out".to_string()),
        ]
    );

    eventually(Duration::from_secs(5), || {
        let registry = registry.clone();
        async move { registry.connection_count().await == 0 }
    })
    .await;

    handle.stop(true).await;
}
