/// HTTP handlers for notification service API
pub mod notifications;
pub mod websocket;

use actix_web::web;

use crate::metrics;

pub use notifications::register_routes as register_notifications;
pub use websocket::register_routes as register_websocket;

/// Every route the service exposes, health and metrics included
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics));
    register_websocket(cfg);
    register_notifications(cfg);
}
