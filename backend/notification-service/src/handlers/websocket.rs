/// WebSocket gateway and connection status endpoints
///
/// Real-time connections are accepted on GET /websocket; the token may come
/// from the `userToken` query parameter or an `Authorization: Bearer` header.
use actix_web::{http::header, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use jwt_security::UserId;
use serde_json::json;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::websocket::GatewaySession;

const TOKEN_PARAM: &str = "userToken";

/// First non-empty `userToken` in the query string
///
/// Read as raw pairs; a repeated parameter must not fail extraction and
/// reject the upgrade.
fn query_token(req: &HttpRequest) -> Option<String> {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(req.query_string()).ok()?;
    pairs
        .into_inner()
        .into_iter()
        .find(|(key, value)| key == TOKEN_PARAM && !value.is_empty())
        .map(|(_, value)| value)
}

/// Query parameter first, then the bearer header. Empty tokens count as none.
fn extract_token(req: &HttpRequest) -> Option<String> {
    query_token(req).or_else(|| {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Upgrade to a websocket
///
/// Endpoint: GET /websocket
///
/// An absent or unverifiable token never rejects the upgrade; the
/// connection is registered anonymous and only receives broadcasts.
pub async fn websocket_gateway(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let user_id = extract_token(&req).and_then(|token| state.identity.decode(&token));

    let (tx, rx) = mpsc::unbounded_channel();
    let id = state.registry.register(tx, user_id.clone()).await;

    let session = GatewaySession::new(id, user_id, state.registry.clone(), rx, state.websocket);

    match ws::start(session, &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "WebSocket upgrade failed");
            state.registry.unregister(id).await;
            Err(e)
        }
    }
}

/// Aggregate connection status
///
/// Endpoint: GET /api/v1/ws/status
pub async fn ws_status(state: web::Data<AppState>) -> HttpResponse {
    let total_connections = state.registry.connection_count().await;
    let connected_users = state.registry.connected_user_ids().await.len();

    HttpResponse::Ok().json(json!({
        "total_connections": total_connections,
        "connected_users": connected_users
    }))
}

/// Get WebSocket connection status for a user
///
/// Endpoint: GET /api/v1/ws/status/{user_id}
pub async fn ws_user_status(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let user_id = UserId::new(path.into_inner());
    let connection_count = state.registry.connection_count_for(&user_id).await;

    HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "connected": connection_count > 0,
        "connection_count": connection_count
    }))
}

/// Get list of all connected user IDs
///
/// Endpoint: GET /api/v1/ws/users
pub async fn list_connected_users(state: web::Data<AppState>) -> HttpResponse {
    let user_ids = state.registry.connected_user_ids().await;

    HttpResponse::Ok().json(json!({
        "count": user_ids.len(),
        "users": user_ids
    }))
}

/// Register WebSocket routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/websocket", web::get().to(websocket_gateway));
    cfg.service(
        web::scope("/api/v1/ws")
            .route("/status", web::get().to(ws_status))
            .route("/status/{user_id}", web::get().to(ws_user_status))
            .route("/users", web::get().to(list_connected_users)),
    );
}
