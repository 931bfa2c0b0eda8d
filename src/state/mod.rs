mod game;
mod room;
pub(crate) mod timers;
pub mod vote;

use crate::broadcast::Gateway;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::protocol::{RoomInfo, ServerMessage};
use crate::sounds::SoundProvider;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Shared handle to one room.
///
/// The room mutex is held for the whole of each event or timer callback, so
/// work against a single room never interleaves. The password is copied out
/// so join-by-password can scan rooms without locking each of them.
#[derive(Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    pub password: String,
    inner: Arc<Mutex<Room>>,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            id: room.id.clone(),
            password: room.password.clone(),
            inner: Arc::new(Mutex::new(room)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Room> {
        self.inner.lock().await
    }

    /// Lock the room, treating an already deleted room as missing
    pub async fn lock_open(&self) -> GameResult<MutexGuard<'_, Room>> {
        let room = self.inner.lock().await;
        if room.closed {
            return Err(GameError::RoomNotFound);
        }
        Ok(room)
    }
}

/// Shared application state.
///
/// Built once at startup and handed to every handler; tests build their own.
pub struct AppState {
    pub config: GameConfig,
    /// Room store: room id -> room
    pub rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    /// Connection registry: connection -> room it last joined
    pub connections: Arc<RwLock<HashMap<ConnectionId, RoomId>>>,
    pub gateway: Gateway,
    pub sounds: Arc<dyn SoundProvider>,
}

impl AppState {
    pub fn new(config: GameConfig, sounds: Arc<dyn SoundProvider>) -> Self {
        Self {
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            gateway: Gateway::new(),
            sounds,
        }
    }

    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    async fn require_room(&self, room_id: &str) -> GameResult<RoomHandle> {
        self.get_room(room_id).await.ok_or(GameError::RoomNotFound)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Room the connection last joined, if any
    pub async fn connection_room(&self, conn: &ConnectionId) -> Option<RoomId> {
        self.connections.read().await.get(conn).cloned()
    }

    /// Send a message to everyone currently in the room
    pub(crate) async fn broadcast_to_room(&self, room: &Room, msg: ServerMessage) {
        self.gateway.send_to_room(&room.player_ids(), msg).await;
    }

    pub(crate) async fn broadcast_room_info(&self, room: &Room) {
        self.broadcast_to_room(room, ServerMessage::RoomInfo(RoomInfo::from(room)))
            .await;
    }
}
