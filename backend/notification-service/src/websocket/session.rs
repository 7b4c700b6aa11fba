use super::messages::InboundFrame;
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::config::WebSocketConfig;
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use jwt_security::UserId;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One gateway connection
///
/// The session is registered before the actor starts. It pumps frames from
/// the registry channel to the socket, answers pings, and unregisters itself
/// when it stops, whatever the cause.
pub struct GatewaySession {
    id: ConnectionId,
    user_id: Option<UserId>,
    registry: ConnectionRegistry,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
    heartbeat: WebSocketConfig,
    hb: Instant,
}

impl GatewaySession {
    pub fn new(
        id: ConnectionId,
        user_id: Option<UserId>,
        registry: ConnectionRegistry,
        outbound: mpsc::UnboundedReceiver<String>,
        heartbeat: WebSocketConfig,
    ) -> Self {
        Self {
            id,
            user_id,
            registry,
            outbound: Some(outbound),
            heartbeat,
            hb: Instant::now(),
        }
    }

    fn user_label(&self) -> &str {
        self.user_id
            .as_ref()
            .map(UserId::as_str)
            .unwrap_or("<anonymous>")
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.heartbeat.client_timeout;
        ctx.run_interval(self.heartbeat.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(
                    connection_id = %act.id,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for GatewaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            connection_id = %self.id,
            user_id = self.user_label(),
            "WebSocket session started"
        );

        if let Some(outbound) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(outbound));
        }

        if self.heartbeat.heartbeat_enabled() {
            self.hb(ctx);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            connection_id = %self.id,
            user_id = self.user_label(),
            "WebSocket session stopped"
        );

        let registry = self.registry.clone();
        let id = self.id;
        actix::spawn(async move {
            registry.unregister(id).await;
        });
    }
}

// Frames queued by the hub
impl StreamHandler<String> for GatewaySession {
    fn handle(&mut self, text: String, ctx: &mut Self::Context) {
        ctx.text(text);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // Registry dropped our sender: the connection was removed elsewhere
        tracing::debug!(connection_id = %self.id, "Outbound channel closed");
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for GatewaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match InboundFrame::parse(&text) {
                    InboundFrame::Json(value) => {
                        tracing::debug!(
                            connection_id = %self.id,
                            message = %value,
                            "Inbound JSON frame"
                        );
                    }
                    InboundFrame::Text(raw) => {
                        tracing::debug!(
                            connection_id = %self.id,
                            message = %raw,
                            "Inbound text frame"
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(bytes)) => {
                self.hb = Instant::now();
                tracing::debug!(
                    connection_id = %self.id,
                    len = bytes.len(),
                    "Binary WebSocket frame ignored"
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(connection_id = %self.id, ?reason, "WebSocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
