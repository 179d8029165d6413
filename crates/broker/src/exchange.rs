//! In-process topic exchange backed by a `tokio::sync::broadcast`
//! channel.
//!
//! Every subscriber independently receives every published delivery and
//! filters it against its own routing pattern, which models a durable
//! topic exchange with per-subscription bindings. Message loss under
//! subscriber lag is surfaced as a logged gap, matching the best-effort
//! nature of the notification channel.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::routing::topic_matches;

/// Buffer capacity for the broadcast channel.
const DELIVERY_CAPACITY: usize = 1024;

/// One routed message on the wire.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub payload: Value,
}

/// A topic exchange. Cheap to share via `Arc`.
#[derive(Debug)]
pub struct Exchange {
    name: String,
    sender: broadcast::Sender<Delivery>,
}

impl Exchange {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(DELIVERY_CAPACITY);
        Self {
            name: name.into(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a delivery. Zero active subscribers is not an error —
    /// the store remains the source of truth regardless of who was
    /// listening.
    pub fn publish(&self, routing_key: impl Into<String>, payload: Value) {
        let delivery = Delivery {
            routing_key: routing_key.into(),
            payload,
        };
        tracing::debug!(
            exchange = %self.name,
            routing_key = %delivery.routing_key,
            "Publishing delivery",
        );
        // SendError only means there are currently no receivers.
        let _ = self.sender.send(delivery);
    }

    /// Bind a subscription with a routing pattern (`*` one word, `#`
    /// zero or more).
    pub fn subscribe(&self, pattern: impl Into<String>) -> Subscription {
        Subscription {
            pattern: pattern.into(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// A bound subscription. Deliveries not matching the pattern are
/// filtered out before the caller sees them.
pub struct Subscription {
    pattern: String,
    receiver: broadcast::Receiver<Delivery>,
}

impl Subscription {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Receive the next matching delivery, or `None` once the exchange
    /// has been dropped. Lagged gaps are logged and skipped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(delivery) => {
                    if topic_matches(&self.pattern, &delivery.routing_key) {
                        return Some(delivery);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        missed,
                        "Subscription lagged; dropped deliveries",
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn per_file_pattern_receives_own_events_only() {
        let exchange = Exchange::new("tasks");
        let mut abc = exchange.subscribe("abc123.*");
        let mut xyz = exchange.subscribe("xyz999.*");

        exchange.publish("abc123.done", json!({"file_id": "abc123", "event": "done"}));
        exchange.publish("xyz999.paused", json!({"file_id": "xyz999", "event": "paused"}));

        let got = abc.recv().await.unwrap();
        assert_eq!(got.routing_key, "abc123.done");

        // xyz must see only its own delivery, never abc's.
        let got = xyz.recv().await.unwrap();
        assert_eq!(got.routing_key, "xyz999.paused");
    }

    #[tokio::test]
    async fn wildcard_subscriber_sees_everything() {
        let exchange = Exchange::new("tasks");
        let mut all = exchange.subscribe("#");

        exchange.publish("abc123.in_queue", json!({}));
        exchange.publish("proceed_task", json!({}));

        assert_eq!(all.recv().await.unwrap().routing_key, "abc123.in_queue");
        assert_eq!(all.recv().await.unwrap().routing_key, "proceed_task");
    }

    #[tokio::test]
    async fn fixed_key_subscription_ignores_notifications() {
        let exchange = Exchange::new("tasks");
        let mut commands = exchange.subscribe("proceed_task");

        exchange.publish("abc123.done", json!({}));
        exchange.publish("proceed_task", json!({"file_id": "abc123"}));

        let got = commands.recv().await.unwrap();
        assert_eq!(got.routing_key, "proceed_task");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let exchange = Exchange::new("tasks");
        exchange.publish("orphan.event", json!({}));
    }

    #[tokio::test]
    async fn recv_returns_none_after_exchange_drop() {
        let exchange = Exchange::new("tasks");
        let mut sub = exchange.subscribe("#");
        drop(exchange);
        assert!(sub.recv().await.is_none());
    }
}
