use actix_web::{http::StatusCode, test, web, App};
use jwt_security::UserId;
use notification_service::{handlers, WebSocketConfig};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::support::{default_identity, test_state};

macro_rules! service {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn health_check() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let app = service!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "OK");
}

#[actix_rt::test]
async fn status_reflects_registry() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let app = service!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/ws/status").to_request(),
    )
    .await;
    assert_eq!(body, json!({ "total_connections": 0, "connected_users": 0 }));

    let (tx_one, _rx_one) = mpsc::unbounded_channel();
    let (tx_two, _rx_two) = mpsc::unbounded_channel();
    let (tx_anon, _rx_anon) = mpsc::unbounded_channel();
    state.registry.register(tx_one, Some(UserId::from("u1"))).await;
    state.registry.register(tx_two, Some(UserId::from("u1"))).await;
    state.registry.register(tx_anon, None).await;

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/ws/status").to_request(),
    )
    .await;
    assert_eq!(body, json!({ "total_connections": 3, "connected_users": 1 }));

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/ws/status/u1").to_request(),
    )
    .await;
    assert_eq!(
        body,
        json!({ "user_id": "u1", "connected": true, "connection_count": 2 })
    );

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/ws/status/nobody").to_request(),
    )
    .await;
    assert_eq!(body["connected"], false);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/ws/users").to_request(),
    )
    .await;
    assert_eq!(body, json!({ "count": 1, "users": ["u1"] }));
}

#[actix_rt::test]
async fn notify_users_writes_to_registered_channels() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let app = service!(state);

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(tx, Some(UserId::from("u1"))).await;

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/users")
            .set_json(json!({
                "type": "ENQUIRY",
                "payload": { "id": "e1", "title": "Is parking included?" },
                "user_ids": "u1"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(body, json!({ "delivered": 1 }));

    let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(frame["type"], "ENQUIRY");
    assert_eq!(frame["payload"]["id"], "e1");
}

#[actix_rt::test]
async fn broadcast_without_connections_delivers_nothing() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let app = service!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/broadcast")
            .set_json(json!({ "type": "ACTIVITY" }))
            .to_request(),
    )
    .await;
    assert_eq!(body, json!({ "delivered": 0 }));
}

#[actix_rt::test]
async fn malformed_requests_are_rejected() {
    let state = test_state(default_identity(), WebSocketConfig::disabled());
    let app = service!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/broadcast")
            .set_json(json!({ "type": "PROPERTY_SOLD", "payload": {} }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/users")
            .set_json(json!({ "type": "USER", "user_ids": [] }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
