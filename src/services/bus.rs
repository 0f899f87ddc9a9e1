//! Notification bus
//!
//! In-process publish-subscribe over the engine's topic namespace. Each
//! topic is backed by a bounded broadcast channel: delivery is FIFO per
//! topic, and a subscriber that lags past the buffer loses the oldest
//! events (best-effort). For critical kinds (TRANSITION_STARTED,
//! TRANSITION_COMPLETED, WORKFLOW_ERROR) the publisher instead applies
//! bounded backpressure, waiting for buffer space before sending. Bus
//! failures never fail the transition that published.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use crate::models::Event;

/// A live subscription to one topic
pub struct Subscription {
    pub topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event. A lagging subscriber skips to the oldest
    /// retained event rather than failing permanently.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(topic = %self.topic, missed, "Subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive, for drain loops.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(topic = %self.topic, missed, "Subscriber lagged, events dropped");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

/// In-process publish-subscribe bus
pub struct NotificationBus {
    topics: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    capacity: usize,
    critical_backpressure: Duration,
}

impl NotificationBus {
    pub fn new(capacity: usize, critical_backpressure: Duration) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            critical_backpressure,
        }
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<Event> {
        {
            let topics = self.topics.read().await;
            if let Some(sender) = topics.get(topic) {
                return sender.clone();
            }
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a topic. Events published before the subscription are
    /// not replayed.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let sender = self.sender_for(&topic).await;
        Subscription {
            receiver: sender.subscribe(),
            topic,
        }
    }

    /// Publish one event to its topic. Returns the number of subscribers
    /// the event was handed to; zero subscribers is not an error.
    pub async fn publish(&self, event: Event) -> usize {
        let sender = self.sender_for(&event.topic).await;

        if event.kind.is_critical() && sender.len() >= self.capacity {
            // Bounded backpressure: give slow subscribers a chance to drain
            // before the broadcast buffer evicts their oldest event.
            let deadline = tokio::time::Instant::now() + self.critical_backpressure;
            while sender.len() >= self.capacity && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            if sender.len() >= self.capacity {
                tracing::warn!(
                    topic = %event.topic,
                    kind = %event.kind,
                    "Topic buffer still full after backpressure window"
                );
            }
        }

        match sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => 0,
        }
    }

    /// Publish the same payload to several topics, in order.
    pub async fn publish_to_all(&self, event: &Event, topics: &[String]) {
        for topic in topics {
            self.publish(event.retopic(topic.clone())).await;
        }
    }

    /// Number of topics with at least one live channel (diagnostics).
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}
