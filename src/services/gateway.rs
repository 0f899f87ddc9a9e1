//! Subscription gateway
//!
//! Client-facing push channels. The gateway keeps a registry of
//! authenticated connections and the topics each one joined (availability
//! rooms, booking rooms, pricing rooms, admin), and re-emits bus events to
//! the matching connections as serialized wire objects. Reconnecting
//! clients re-subscribe themselves; missed events are not replayed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::Event;
use crate::services::bus::NotificationBus;

/// Per-connection outbound channel capacity
const CONNECTION_CHANNEL_CAPACITY: usize = 100;

/// One connected client
#[derive(Clone)]
struct ClientConnection {
    /// Authenticated principal behind the connection
    client_ref: String,
    sender: broadcast::Sender<String>,
}

#[derive(Default)]
struct GatewayInner {
    connections: HashMap<Uuid, ClientConnection>,
    /// topic -> members
    rooms: HashMap<String, HashSet<Uuid>>,
    /// topic -> bus forwarder task
    forwarders: HashMap<String, JoinHandle<()>>,
}

/// Connection registry re-emitting bus events to subscribed clients
pub struct SubscriptionGateway {
    bus: Arc<NotificationBus>,
    inner: RwLock<GatewayInner>,
}

impl SubscriptionGateway {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self {
            bus,
            inner: RwLock::new(GatewayInner::default()),
        }
    }

    /// The bus this gateway re-emits from.
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Wrap a connection receiver as a stream, for transports (SSE,
    /// WebSocket) that consume `Stream`s of serialized events.
    pub fn into_stream(
        receiver: broadcast::Receiver<String>,
    ) -> tokio_stream::wrappers::BroadcastStream<String> {
        tokio_stream::wrappers::BroadcastStream::new(receiver)
    }

    /// Register a connection for an authenticated client.
    ///
    /// Returns the connection id and the receiver of serialized events.
    pub async fn connect(&self, client_ref: &str) -> (Uuid, broadcast::Receiver<String>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = broadcast::channel(CONNECTION_CHANNEL_CAPACITY);

        let mut inner = self.inner.write().await;
        inner.connections.insert(
            connection_id,
            ClientConnection {
                client_ref: client_ref.to_string(),
                sender,
            },
        );

        tracing::info!(
            client = %client_ref,
            connection_id = %connection_id,
            "Gateway client connected"
        );

        (connection_id, receiver)
    }

    /// Join a topic room. The first member of a room starts the bus
    /// forwarder for that topic.
    pub async fn join(self: &Arc<Self>, connection_id: Uuid, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(&connection_id) {
            return false;
        }

        inner.rooms.entry(topic.clone()).or_default().insert(connection_id);

        if !inner.forwarders.contains_key(&topic) {
            let gateway = Arc::clone(self);
            let forward_topic = topic.clone();
            let handle = tokio::spawn(async move {
                gateway.forward_topic(forward_topic).await;
            });
            inner.forwarders.insert(topic.clone(), handle);
        }

        tracing::debug!(connection_id = %connection_id, topic = %topic, "Joined room");
        true
    }

    /// Leave a topic room.
    pub async fn leave(&self, connection_id: Uuid, topic: &str) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(topic) {
            members.remove(&connection_id);
            if members.is_empty() {
                inner.rooms.remove(topic);
                if let Some(handle) = inner.forwarders.remove(topic) {
                    handle.abort();
                }
            }
        }
    }

    /// Drop a connection and all of its room memberships.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let mut inner = self.inner.write().await;
        let client = inner.connections.remove(&connection_id);

        let emptied: Vec<String> = inner
            .rooms
            .iter_mut()
            .filter_map(|(topic, members)| {
                members.remove(&connection_id);
                members.is_empty().then(|| topic.clone())
            })
            .collect();
        for topic in emptied {
            inner.rooms.remove(&topic);
            if let Some(handle) = inner.forwarders.remove(&topic) {
                handle.abort();
            }
        }

        if let Some(client) = client {
            tracing::info!(
                client = %client.client_ref,
                connection_id = %connection_id,
                "Gateway client disconnected"
            );
        }
    }

    async fn forward_topic(self: Arc<Self>, topic: String) {
        let mut subscription = self.bus.subscribe(topic.clone()).await;
        while let Some(event) = subscription.recv().await {
            if !self.fan_out(&topic, &event).await {
                break;
            }
        }
    }

    /// Serialize an event to every member of a room. Returns false when the
    /// room is gone and the forwarder should stop.
    async fn fan_out(&self, topic: &str, event: &Event) -> bool {
        let inner = self.inner.read().await;
        let members = match inner.rooms.get(topic) {
            Some(members) if !members.is_empty() => members,
            _ => return false,
        };

        let wire = event.to_wire();
        let mut sent = 0usize;
        for connection_id in members {
            if let Some(connection) = inner.connections.get(connection_id) {
                if connection.sender.send(wire.clone()).is_ok() {
                    sent += 1;
                }
            }
        }

        tracing::debug!(topic = %topic, kind = %event.kind, sent, "Event pushed to room");
        true
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Number of members in a room.
    pub async fn room_size(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(topic)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Drain everything on shutdown: stop forwarders, drop connections.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        for (_, handle) in inner.forwarders.drain() {
            handle.abort();
        }
        inner.rooms.clear();
        inner.connections.clear();
        tracing::info!("Subscription gateway drained");
    }
}
