pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod state;
pub mod websocket;

pub use config::{Config, WebSocketConfig};
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use websocket::{
    ConnectionRegistry, DeliveryFailure, DeliveryFailureReporter, NotificationHub, Recipients,
};
