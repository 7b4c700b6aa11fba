use std::collections::HashMap;
use std::fmt::Debug;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::ws;
use futures_util::{Stream, StreamExt};
use jwt_security::{TokenIdentity, UserId};
use notification_service::{handlers, AppState, NotificationHub, WebSocketConfig};

/// Fixed token table standing in for JWT verification
pub struct MapIdentity(HashMap<String, UserId>);

impl MapIdentity {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self(
            entries
                .iter()
                .map(|(token, user)| (token.to_string(), UserId::from(*user)))
                .collect(),
        )
    }
}

impl TokenIdentity for MapIdentity {
    fn decode(&self, token: &str) -> Option<UserId> {
        self.0.get(token).cloned()
    }
}

pub fn test_state(identity: Arc<dyn TokenIdentity>, websocket: WebSocketConfig) -> AppState {
    AppState::new(NotificationHub::new(), identity, websocket)
}

pub fn default_identity() -> Arc<dyn TokenIdentity> {
    Arc::new(MapIdentity::new(&[("token-a", "user-a"), ("token-b", "user-b")]))
}

pub async fn start_gateway(state: AppState) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure)
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

/// Next text frame, skipping pings; panics after five seconds
pub async fn next_text<S, E>(connection: &mut S) -> String
where
    S: Stream<Item = Result<ws::Frame, E>> + Unpin,
    E: Debug,
{
    let deadline = Duration::from_secs(5);
    loop {
        let frame = tokio::time::timeout(deadline, connection.next())
            .await
            .expect("frame before timeout")
            .expect("connection open")
            .expect("frame data");

        match frame {
            ws::Frame::Text(bytes) => return String::from_utf8(bytes.to_vec()).unwrap(),
            ws::Frame::Ping(_) | ws::Frame::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Poll an async condition every 20ms for up to `within`
pub async fn eventually<F, Fut>(within: Duration, condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < within {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within {within:?}");
}

/// Synchronous variant of `eventually`
pub async fn wait_for<F: Fn() -> bool>(within: Duration, condition: F) {
    eventually(within, || std::future::ready(condition())).await;
}
