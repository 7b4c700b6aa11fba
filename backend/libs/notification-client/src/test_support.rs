//! In-memory transport for unit tests

use crate::error::TransportError;
use crate::transport::{Connector, Transport};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Poll `condition` until it holds, panicking after one second
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 1s");
}

/// Server end of one mock transport
pub struct MockServer {
    to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: Mutex<mpsc::UnboundedReceiver<String>>,
    received: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockServer {
    pub fn push(&self, text: &str) {
        // The client may already be gone; that is what stale-socket tests check
        let _ = self.to_client.unbounded_send(Ok(text.to_string()));
    }

    pub fn fail(&self, error: TransportError) {
        let _ = self.to_client.unbounded_send(Err(error));
    }

    /// End the inbound stream as a server-initiated close would
    pub fn close(&self) {
        self.to_client.close_channel();
    }

    fn drain(&self) {
        let mut from_client = self.from_client.lock().unwrap();
        let mut received = self.received.lock().unwrap();
        loop {
            match from_client.try_next() {
                Ok(Some(text)) => received.push(text),
                Ok(None) => {
                    self.closed.store(true, Ordering::SeqCst);
                    break;
                }
                Err(_) => break,
            }
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.drain();
        self.received.lock().unwrap().clone()
    }

    pub fn is_closed_by_client(&self) -> bool {
        self.drain();
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockConnector {
    servers: Mutex<Vec<Arc<MockServer>>>,
    urls: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
    gate: Option<Semaphore>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every open fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    /// Opens block until `release` is called
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    pub fn server(&self, index: usize) -> Arc<MockServer> {
        self.servers.lock().unwrap()[index].clone()
    }

    pub async fn wait_for_server(&self, index: usize) -> Arc<MockServer> {
        wait_until(|| self.open_count() > index).await;
        self.server(index)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| TransportError::Closed)?
                .forget();
        }

        if self.fail {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (to_client, client_inbound) = mpsc::unbounded();
        let (client_outbound, from_client) = mpsc::unbounded();

        self.servers.lock().unwrap().push(Arc::new(MockServer {
            to_client,
            from_client: Mutex::new(from_client),
            received: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }));

        Ok(Transport {
            sink: Box::pin(client_outbound.sink_map_err(|_| TransportError::Closed)),
            stream: Box::pin(client_inbound),
        })
    }
}
