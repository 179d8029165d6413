//! Lazily-established, memoized broker connection.
//!
//! The connection is an explicitly owned object injected into the
//! components that need it, never a global. The first caller triggers
//! the connect; concurrent callers await the same in-flight attempt;
//! a failed attempt leaves the handle unconnected so a later call can
//! retry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use sentra_core::CoreError;

use crate::exchange::Exchange;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connect failed: {0}")]
    Connect(String),

    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<BrokerError> for CoreError {
    fn from(e: BrokerError) -> Self {
        CoreError::TransientBroker(e.to_string())
    }
}

/// The connect seam. Production wiring hands the broker a [`Local`]
/// connector over a shared in-process exchange; tests use
/// [`Unreachable`] to exercise failure paths.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self) -> Result<Arc<Exchange>, BrokerError>;
}

/// Connector over an already-running in-process exchange.
pub struct Local {
    exchange: Arc<Exchange>,
}

impl Local {
    pub fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl Connect for Local {
    async fn connect(&self) -> Result<Arc<Exchange>, BrokerError> {
        Ok(Arc::clone(&self.exchange))
    }
}

/// Always-failing connector, for exercising fallback behavior.
pub struct Unreachable;

#[async_trait]
impl Connect for Unreachable {
    async fn connect(&self) -> Result<Arc<Exchange>, BrokerError> {
        Err(BrokerError::Connect("broker endpoint unreachable".into()))
    }
}

/// Owned broker handle with a memoized channel.
pub struct Broker {
    connector: Box<dyn Connect>,
    channel: OnceCell<Arc<Exchange>>,
}

impl Broker {
    pub fn new(connector: impl Connect + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            channel: OnceCell::new(),
        }
    }

    /// Convenience constructor for the common in-process wiring.
    pub fn local(exchange: Arc<Exchange>) -> Self {
        Self::new(Local::new(exchange))
    }

    /// Get the connected channel, establishing it on first use.
    ///
    /// Concurrent first callers share one in-flight connect attempt.
    /// On failure the cell stays empty, so the next caller retries.
    pub async fn channel(&self) -> Result<&Arc<Exchange>, BrokerError> {
        self.channel
            .get_or_try_init(|| async {
                tracing::info!("Establishing broker channel");
                self.connector.connect().await
            })
            .await
    }

    /// Whether a channel has been established.
    pub fn is_connected(&self) -> bool {
        self.channel.initialized()
    }
}
