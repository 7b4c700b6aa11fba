/// Notification publishing handlers
///
/// Thin HTTP front for `NotificationHub`, used by other services that cannot
/// link the hub directly. Delivery failures never turn into 5xx responses;
/// the response only reports how many connections were written to.
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use event_schema::NotificationKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;
use crate::websocket::Recipients;

/// Body of POST /api/v1/notifications/broadcast
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub payload: Value,
}

/// Body of POST /api/v1/notifications/users
#[derive(Debug, Deserialize)]
pub struct UserNotificationRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub payload: Value,
    pub user_ids: Recipients,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub delivered: usize,
}

/// Broadcast to every connection
///
/// POST /api/v1/notifications/broadcast
pub async fn broadcast_notification(
    state: web::Data<AppState>,
    body: web::Json<BroadcastRequest>,
) -> HttpResponse {
    let BroadcastRequest { kind, payload } = body.into_inner();
    let delivered = state.hub.broadcast(kind, payload).await;

    HttpResponse::Ok().json(DeliveryResponse { delivered })
}

/// Send to the connections of specific users
///
/// POST /api/v1/notifications/users
pub async fn notify_users(
    state: web::Data<AppState>,
    body: web::Json<UserNotificationRequest>,
) -> Result<HttpResponse, AppError> {
    let UserNotificationRequest {
        kind,
        payload,
        user_ids,
    } = body.into_inner();

    if user_ids.is_empty() {
        return Err(AppError::BadRequest("user_ids must not be empty".into()));
    }

    let delivered = state.hub.send_to_users(kind, payload, user_ids).await;
    Ok(HttpResponse::Ok().json(DeliveryResponse { delivered }))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/broadcast", web::post().to(broadcast_notification))
            .route("/users", web::post().to(notify_users)),
    );
}
