//! Outbound delivery: send-to-one and send-to-room.
//!
//! Each live WebSocket registers an unbounded channel here; the socket task
//! drains it. Room membership is owned by the room itself, so a room
//! broadcast is a fan-out over the room's player ids.

use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerMessage>;

#[derive(Clone, Default)]
pub struct Gateway {
    connections: Arc<RwLock<HashMap<ConnectionId, OutboundSender>>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and get the receiving end of its outbound queue
    pub async fn register(&self, conn: ConnectionId) -> OutboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(conn, tx);
        rx
    }

    pub async fn unregister(&self, conn: &ConnectionId) {
        self.connections.write().await.remove(conn);
    }

    /// Send to one connection. Unknown or closed connections are ignored.
    pub async fn send_to(&self, conn: &ConnectionId, msg: ServerMessage) {
        if let Some(tx) = self.connections.read().await.get(conn) {
            if tx.send(msg).is_err() {
                tracing::debug!("Dropping message for closed connection {}", conn);
            }
        }
    }

    /// Send the same message to every listed connection
    pub async fn send_to_room(&self, members: &[ConnectionId], msg: ServerMessage) {
        let connections = self.connections.read().await;
        for conn in members {
            if let Some(tx) = connections.get(conn) {
                // Ignore send errors (socket already closing is fine)
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_room_reaches_members_only() {
        let gateway = Gateway::new();
        let mut a = gateway.register("a".to_string()).await;
        let mut b = gateway.register("b".to_string()).await;
        let mut c = gateway.register("c".to_string()).await;

        gateway
            .send_to_room(
                &["a".to_string(), "b".to_string(), "ghost".to_string()],
                ServerMessage::VoteCancelled,
            )
            .await;

        assert_eq!(a.try_recv().unwrap(), ServerMessage::VoteCancelled);
        assert_eq!(b.try_recv().unwrap(), ServerMessage::VoteCancelled);
        assert!(c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let gateway = Gateway::new();
        let mut a = gateway.register("a".to_string()).await;
        gateway.unregister(&"a".to_string()).await;

        gateway
            .send_to(&"a".to_string(), ServerMessage::VoteCancelled)
            .await;

        assert!(a.try_recv().is_err());
        assert_eq!(gateway.connection_count().await, 0);
    }
}
