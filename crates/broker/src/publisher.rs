//! Publishing façade over the broker connection.
//!
//! Every publish site states what a broker failure means for the caller:
//! user-facing commands propagate so the caller sees the outage, while
//! lifecycle notifications are swallowed (logged) because the store is
//! authoritative and watchers reconcile against it anyway.

use std::sync::Arc;

use tracing::{debug, warn};

use sentra_core::CoreError;

use crate::connection::Broker;
use crate::messages::{Command, Notification};

/// What a failed publish means at a given call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Log and report success. For best-effort notifications.
    Swallow,
    /// Surface the error to the caller. For user-initiated commands.
    Propagate,
}

/// Publishes task commands and notifications.
#[derive(Clone)]
pub struct TaskPublisher {
    broker: Arc<Broker>,
}

impl TaskPublisher {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Publish a worker command. Always propagates failure: a command
    /// that never reached the broker must be reported to whoever asked
    /// for it.
    pub async fn send_command(&self, command: &Command) -> Result<(), CoreError> {
        let channel = self.broker.channel().await?;
        let payload = command.payload().map_err(CoreError::from)?;
        channel.publish(command.routing_key(), payload);
        debug!(
            routing_key = command.routing_key(),
            file_id = %command.file_id(),
            "command published"
        );
        Ok(())
    }

    /// Publish a status or progression notification under the stated
    /// failure policy.
    pub async fn announce(
        &self,
        notification: &Notification,
        on_failure: OnFailure,
    ) -> Result<(), CoreError> {
        let result = self.try_announce(notification).await;
        match (result, on_failure) {
            (Ok(()), _) => Ok(()),
            (Err(err), OnFailure::Swallow) => {
                warn!(
                    file_id = %notification.file_id,
                    event = %notification.event,
                    error = %err,
                    "dropping notification, broker unavailable"
                );
                Ok(())
            }
            (Err(err), OnFailure::Propagate) => Err(err),
        }
    }

    async fn try_announce(&self, notification: &Notification) -> Result<(), CoreError> {
        let channel = self.broker.channel().await?;
        let payload = notification.payload().map_err(CoreError::from)?;
        channel.publish(&notification.routing_key(), payload);
        Ok(())
    }
}
