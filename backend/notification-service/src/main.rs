use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use jwt_security::JwtIdentity;
use notification_service::{handlers, logging, metrics, AppState, Config, NotificationHub};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(config.log_format);

    tracing::info!("Starting notification service");
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    let identity =
        JwtIdentity::from_secret(&config.jwt_secret).context("failed to build token identity")?;

    let hub = NotificationHub::new();
    let state = AppState::new(hub, Arc::new(identity), config.websocket);

    if config.websocket.heartbeat_enabled() {
        tracing::info!(
            interval_secs = config.websocket.heartbeat_interval.as_secs(),
            timeout_secs = config.websocket.client_timeout.as_secs(),
            "WebSocket heartbeat enabled"
        );
    } else {
        tracing::info!("WebSocket heartbeat disabled");
    }

    let addr = config.app.bind_addr();
    tracing::info!(env = %config.app.env, "Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/", web::get().to(|| async { "Notification Service v1.0" }))
            .configure(handlers::configure)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {addr}"))?
    .run()
    .await
    .context("HTTP server terminated with an error")?;

    Ok(())
}
