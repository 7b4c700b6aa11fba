//! Client side of the real-time notification channel
//!
//! - `ConnectionManager`: one websocket, a status machine and the message log
//! - `NotificationDispatcher`: turns newly arrived notifications into effects
//! - `SessionStore` / `SocketLifecycle`: connect and disconnect as the auth
//!   token comes and goes
//!
//! The manager is meant to be created once by the composition root and
//! cloned wherever it is needed.

pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod manager;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use dispatcher::{NotificationDispatcher, NotificationEffects};
pub use effects::{
    AuthStore, CachePartition, EnquiryStore, InMemoryEnquiryStore, InMemoryQueryCache,
    QueryCache, Severity, Toaster, TracingToaster,
};
pub use error::{ClientError, ClientResult, TransportError};
pub use manager::{ConnectionManager, ConnectionSnapshot, ConnectionStatus, Subscription};
pub use session::{
    bind_session, transition, LifecycleAction, SessionStore, SocketLifecycle, TokenObserver,
};
pub use transport::{Connector, Transport, TungsteniteConnector};
