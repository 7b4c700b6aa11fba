/// WebSocket real-time notification system
///
/// Architecture:
/// 1. ConnectionRegistry: live connections keyed by a monotonic id
/// 2. NotificationHub: typed targeted/broadcast delivery on top of the registry
/// 3. GatewaySession: per-connection actor that drains the outbound channel
/// 4. DeliveryFailureReporter: where dropped notifications are accounted for
pub mod hub;
pub mod messages;
pub mod registry;
pub mod reporter;
pub mod session;

pub use hub::{DeliveryMode, NotificationHub, Recipients};
pub use messages::InboundFrame;
pub use registry::{ConnectionId, ConnectionInfo, ConnectionRegistry, OutboundSender, SendOutcome};
pub use reporter::{DeliveryFailure, DeliveryFailureReporter, TracingFailureReporter};
pub use session::GatewaySession;
