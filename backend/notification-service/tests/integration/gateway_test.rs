use std::time::Duration;

use awc::{ws, Client};
use event_schema::{NotificationKind, UserNotificationPayload};
use futures_util::SinkExt;
use jwt_security::UserId;
use notification_service::WebSocketConfig;
use serde_json::{json, Value};

use super::support::{default_identity, eventually, next_text, start_gateway, test_state};

#[actix_rt::test]
async fn targeted_notification_reaches_only_its_user() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");
    let client = Client::new();

    let (_resp, mut alice) = client
        .ws(format!("http://{addr}/websocket?userToken=token-a"))
        .connect()
        .await
        .expect("connect user-a");
    let (_resp, mut bob) = client
        .ws(format!("http://{addr}/websocket?userToken=token-b"))
        .connect()
        .await
        .expect("connect user-b");

    let delivered = state
        .hub
        .notify_user(
            "user-a",
            UserNotificationPayload {
                message: Some("Profile approved".into()),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(delivered, 1);

    let text = next_text(&mut alice).await;
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "USER");
    assert_eq!(value["payload"]["message"], "Profile approved");

    // Bob's first frame is the broadcast, so the targeted send skipped him
    state
        .hub
        .broadcast(NotificationKind::Activity, json!({ "description": "all" }))
        .await;
    let text = next_text(&mut bob).await;
    assert!(text.contains("ACTIVITY"));

    handle.stop(true).await;
}

#[actix_rt::test]
async fn unverifiable_token_connects_as_anonymous() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    let (_resp, mut connection) = Client::new()
        .ws(format!("http://{addr}/websocket?userToken=forged"))
        .connect()
        .await
        .expect("upgrade is never rejected");

    assert_eq!(state.registry.connection_count().await, 1);
    assert!(state.registry.connected_user_ids().await.is_empty());

    let targeted = state
        .hub
        .send_to_users(NotificationKind::User, json!({}), "forged")
        .await;
    assert_eq!(targeted, 0);

    let broadcast = state
        .hub
        .broadcast(NotificationKind::Enquiry, json!({ "title": "Hi" }))
        .await;
    assert_eq!(broadcast, 1);
    assert_eq!(
        next_text(&mut connection).await,
        r#"{"type":"ENQUIRY","payload":{"title":"Hi"}}"#
    );

    handle.stop(true).await;
}

#[actix_rt::test]
async fn bearer_header_identifies_user() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    let (_resp, mut connection) = Client::new()
        .ws(format!("http://{addr}/websocket"))
        .bearer_auth("token-b")
        .connect()
        .await
        .expect("connect with header");

    assert_eq!(
        state.registry.connected_user_ids().await,
        vec![UserId::from("user-b")]
    );

    state
        .hub
        .force_logout("user-b", Some("password changed".into()))
        .await;
    let value: Value = serde_json::from_str(&next_text(&mut connection).await).unwrap();
    assert_eq!(value["type"], "USER_LOGOUT");
    assert_eq!(value["payload"]["reason"], "password changed");

    handle.stop(true).await;
}

#[actix_rt::test]
async fn repeated_token_parameter_still_upgrades() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    let (_resp, _connection) = Client::new()
        .ws(format!("http://{addr}/websocket?userToken=token-a&userToken=token-b"))
        .connect()
        .await
        .expect("upgrade is never rejected");

    assert_eq!(
        state.registry.connected_user_ids().await,
        vec![UserId::from("user-a")]
    );

    handle.stop(true).await;
}

#[actix_rt::test]
async fn every_connection_of_a_user_receives_the_notification() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");
    let client = Client::new();

    let (_resp, mut tab_one) = client
        .ws(format!("http://{addr}/websocket?userToken=token-a"))
        .connect()
        .await
        .expect("first tab");
    let (_resp, mut tab_two) = client
        .ws(format!("http://{addr}/websocket?userToken=token-a"))
        .connect()
        .await
        .expect("second tab");

    let delivered = state
        .hub
        .send_to_users(
            NotificationKind::User,
            json!({ "message": "hello" }),
            vec!["user-a", "user-a"],
        )
        .await;
    assert_eq!(delivered, 2);
    assert_eq!(next_text(&mut tab_one).await, next_text(&mut tab_two).await);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn closed_connection_is_unregistered() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    let (_resp, mut connection) = Client::new()
        .ws(format!("http://{addr}/websocket?userToken=token-a"))
        .connect()
        .await
        .expect("connect");
    assert_eq!(state.registry.connection_count().await, 1);

    connection
        .send(ws::Message::Close(None))
        .await
        .expect("send close");

    let registry = state.registry.clone();
    eventually(Duration::from_secs(5), || {
        let registry = registry.clone();
        async move { registry.connection_count().await == 0 }
    })
    .await;

    let delivered = state
        .hub
        .send_to_users(NotificationKind::User, json!({}), "user-a")
        .await;
    assert_eq!(delivered, 0);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn silent_client_is_dropped_after_heartbeat_timeout() {
    let heartbeat = WebSocketConfig {
        heartbeat_interval: Duration::from_millis(200),
        client_timeout: Duration::from_millis(500),
    };
    let state = test_state(default_identity(), heartbeat);
    let (addr, handle) = start_gateway(state.clone())
        .await
        .expect("start gateway");

    // Never polled, so pings go unanswered
    let (_resp, _connection) = Client::new()
        .ws(format!("http://{addr}/websocket?userToken=token-a"))
        .connect()
        .await
        .expect("connect");
    assert_eq!(state.registry.connection_count().await, 1);

    let registry = state.registry.clone();
    eventually(Duration::from_secs(5), || {
        let registry = registry.clone();
        async move { registry.connection_count().await == 0 }
    })
    .await;

    handle.stop(true).await;
}
