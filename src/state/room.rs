use super::timers;
use super::{AppState, RoomHandle};
use crate::codes::{generate_password, generate_room_id, normalize_password};
use crate::error::{GameError, GameResult};
use crate::protocol::{RoomInfo, ServerMessage};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Trimmed player-supplied name, if it has any content
fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn display_name(name: Option<String>, position: usize) -> String {
    clean_name(name).unwrap_or_else(|| format!("Player{}", position))
}

fn check_joinable(room: &Room) -> GameResult<()> {
    if room.is_full() {
        return Err(GameError::RoomFull);
    }
    if room.status != RoomStatus::Waiting {
        return Err(GameError::GameAlreadyStarted);
    }
    Ok(())
}

/// Attempts at drawing an unused room id before giving up
const MAX_CODE_ATTEMPTS: usize = 32;

/// Draw a room id and password that do not collide with a live room.
///
/// The id must be unique. A password collision is accepted once the attempts
/// run out (join-by-password then finds one of the rooms sharing it).
fn pick_codes(
    rooms: &HashMap<RoomId, RoomHandle>,
    id_length: usize,
) -> GameResult<(RoomId, String)> {
    let mut fallback = None;
    for _ in 0..MAX_CODE_ATTEMPTS {
        let room_id = generate_room_id(id_length);
        if rooms.contains_key(&room_id) {
            continue;
        }
        let password = generate_password();
        if !rooms.values().any(|r| r.password == password) {
            return Ok((room_id, password));
        }
        fallback = Some((room_id, password));
    }

    match fallback {
        Some(codes) => {
            tracing::warn!("Accepting password collision for room {}", codes.0);
            Ok(codes)
        }
        None => {
            tracing::warn!("No free room id after {} attempts", MAX_CODE_ATTEMPTS);
            Err(GameError::NoFreeRoomCode)
        }
    }
}

impl AppState {
    /// Create a room with the requester as its only player
    pub async fn create_room(
        self: &Arc<Self>,
        conn: &ConnectionId,
        player_name: Option<String>,
    ) -> GameResult<RoomInfo> {
        if !self.sounds.has_sounds() {
            return Err(GameError::GameNotReady);
        }

        self.leave_current_room(conn).await;

        let handle = {
            let mut rooms = self.rooms.write().await;
            let (room_id, password) = pick_codes(&rooms, self.config.room_id_length)?;

            let mut room = Room::new(room_id.clone(), password, self.config.max_players);
            room.players
                .push(Player::new(conn.clone(), display_name(player_name, 1)));

            let handle = RoomHandle::new(room);
            rooms.insert(room_id, handle.clone());
            handle
        };

        self.connections
            .write()
            .await
            .insert(conn.clone(), handle.id.clone());

        let live = self.room_count().await;
        tracing::info!(
            "Room created: {} (password {}), {} rooms live",
            handle.id,
            handle.password,
            live
        );

        // The creator navigates to the room page once this arrives
        let gateway = self.gateway.clone();
        let creator = conn.clone();
        let delay = self.config.room_created_delay;
        let created = ServerMessage::RoomCreated {
            room_id: handle.id.clone(),
            password: handle.password.clone(),
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            gateway.send_to(&creator, created).await;
        });

        let room = handle.lock().await;
        Ok(RoomInfo::from(&*room))
    }

    /// Join a waiting room by its password
    pub async fn join_room(
        self: &Arc<Self>,
        conn: &ConnectionId,
        room_password: &str,
        player_name: Option<String>,
    ) -> GameResult<RoomId> {
        if !self.sounds.has_sounds() {
            return Err(GameError::GameNotReady);
        }
        let password = normalize_password(room_password).ok_or(GameError::InvalidPassword)?;

        let handle = self
            .rooms
            .read()
            .await
            .values()
            .find(|r| r.password == password)
            .cloned()
            .ok_or(GameError::RoomNotFound)?;

        // Validate before leaving any previous room; re-checked below
        check_joinable(&*handle.lock_open().await?)?;
        if self.connection_room(conn).await.as_deref() != Some(handle.id.as_str()) {
            self.leave_current_room(conn).await;
        }

        let mut room = handle.lock_open().await?;
        if !room.has_player(conn) {
            check_joinable(&room)?;
            let name = display_name(player_name, room.players.len() + 1);
            tracing::info!(
                "Player {} joined room {} ({}/{})",
                name,
                room.id,
                room.players.len() + 1,
                room.max_players
            );
            room.players.push(Player::new(conn.clone(), name));
            room.timers.cancel_grace();
        }

        self.connections
            .write()
            .await
            .insert(conn.clone(), room.id.clone());
        self.broadcast_room_info(&room).await;

        Ok(room.id.clone())
    }

    /// Attach this connection to a room by id, creating a player if needed.
    ///
    /// Used by the room page on load, so it admits players in any phase.
    pub async fn identify_room(
        self: &Arc<Self>,
        conn: &ConnectionId,
        room_id: &str,
        player_name: Option<String>,
    ) -> GameResult<RoomInfo> {
        let handle = self.require_room(room_id).await?;
        drop(handle.lock_open().await?);

        if self.connection_room(conn).await.as_deref() != Some(room_id) {
            self.leave_current_room(conn).await;
        }

        let mut room = handle.lock_open().await?;
        let position = room.players.len() + 1;
        let created = if room.has_player(conn) {
            if let (Some(name), Some(player)) = (clean_name(player_name), room.player_mut(conn)) {
                if player.name != name {
                    tracing::info!("Renaming player {} to {}", player.name, name);
                    player.name = name;
                }
            }
            false
        } else {
            let name = display_name(player_name, position);
            tracing::info!("Player {} identified with room {}", name, room.id);
            room.players.push(Player::new(conn.clone(), name));
            room.timers.cancel_grace();
            if room.status == RoomStatus::Voting {
                // Someone new has not voted yet
                room.disarm_tally();
            }
            true
        };

        self.connections
            .write()
            .await
            .insert(conn.clone(), room.id.clone());

        let info = RoomInfo::from(&*room);
        if created {
            let others: Vec<PlayerId> = room
                .players
                .iter()
                .filter(|p| p.id != *conn)
                .map(|p| p.id.clone())
                .collect();
            self.gateway
                .send_to_room(&others, ServerMessage::RoomInfo(info.clone()))
                .await;
            if room.status == RoomStatus::Voting {
                self.broadcast_voting_update(&room).await;
            }
        }

        Ok(info)
    }

    pub async fn room_info(&self, room_id: &str) -> GameResult<RoomInfo> {
        let handle = self.require_room(room_id).await?;
        let room = handle.lock_open().await?;
        Ok(RoomInfo::from(&*room))
    }

    /// Remove a closed connection from its room
    pub async fn disconnect(self: &Arc<Self>, conn: &ConnectionId) {
        tracing::info!("Connection {} disconnected", conn);
        self.leave_current_room(conn).await;
    }

    /// Drop the connection from the room it is indexed to, if any
    async fn leave_current_room(self: &Arc<Self>, conn: &ConnectionId) {
        let Some(room_id) = self.connections.write().await.remove(conn) else {
            return;
        };
        let Some(handle) = self.get_room(&room_id).await else {
            return;
        };
        let Ok(mut room) = handle.lock_open().await else {
            return;
        };
        let Some(index) = room.players.iter().position(|p| p.id == *conn) else {
            return;
        };

        let player = room.players.remove(index);
        tracing::info!("Removing player {} from room {}", player.name, room.id);
        if player.is_ready {
            room.ready_count -= 1;
        }
        if let Some(target) = &player.voted_for {
            room.votes.remove(target);
        }

        if room.is_empty() {
            if room.status != RoomStatus::Waiting {
                tracing::info!(
                    "Room {} emptied while {:?}, abandoning the round",
                    room.id,
                    room.status
                );
                room.abandon_round();
            }
            tracing::info!("Scheduling deletion of empty room {}", room.id);
            timers::arm_grace_deletion(self, &mut room);
            return;
        }

        self.broadcast_room_info(&room).await;

        if room.status == RoomStatus::Voting {
            self.broadcast_voting_update(&room).await;
            if room.all_voted() {
                timers::arm_tally(self, &mut room);
            }
        }
    }

    /// Grace timer callback: delete the room only if nobody came back
    pub(crate) async fn delete_if_empty(&self, room_id: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(room_id).cloned() else {
            return;
        };
        let mut room = handle.lock().await;
        room.timers.release_grace();
        if room.closed || !room.is_empty() || room.status != RoomStatus::Waiting {
            return;
        }

        room.close();
        rooms.remove(room_id);
        tracing::info!("Deleted empty room {}, {} rooms live", room_id, rooms.len());
    }
}

impl Room {
    /// Mark the room deleted and invalidate all of its timers
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.generation += 1;
        self.timers.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::GameConfig;
    use crate::sounds::SoundLibrary;
    use std::time::Duration;

    fn conn(id: &str) -> ConnectionId {
        id.to_string()
    }

    #[tokio::test]
    async fn test_create_room() {
        let state = app_state();
        let info = state
            .create_room(&conn("c1"), Some("Alice".to_string()))
            .await
            .unwrap();

        assert_eq!(info.players.len(), 1);
        assert_eq!(info.players[0].name, "Alice");
        assert_eq!(info.password.len(), 4);
        assert_eq!(state.room_count().await, 1);

        let room_id = state.connection_room(&conn("c1")).await.unwrap();
        let handle = state.get_room(&room_id).await.unwrap();
        let room = handle.lock().await;
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.id.len(), 6);
    }

    #[tokio::test]
    async fn test_create_room_without_sounds() {
        let state = Arc::new(AppState::new(
            GameConfig::default(),
            Arc::new(SoundLibrary::default()),
        ));

        let result = state.create_room(&conn("c1"), None).await;
        assert_eq!(result.unwrap_err(), GameError::GameNotReady);
        assert_eq!(state.room_count().await, 0);

        let result = state.join_room(&conn("c2"), "AB12", None).await;
        assert_eq!(result.unwrap_err(), GameError::GameNotReady);
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_created_follows_shortly() {
        let state = app_state();
        let mut rx = state.gateway.register(conn("c1")).await;
        let info = state.create_room(&conn("c1"), None).await.unwrap();

        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(150)).await;

        match rx.try_recv().unwrap() {
            ServerMessage::RoomCreated { password, .. } => assert_eq!(password, info.password),
            other => panic!("Expected RoomCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_room_by_password() {
        let state = app_state();
        let info = state.create_room(&conn("c1"), None).await.unwrap();
        let mut rx = state.gateway.register(conn("c1")).await;

        let room_id = state
            .join_room(&conn("c2"), &info.password.to_lowercase(), None)
            .await
            .unwrap();

        let info = state.room_info(&room_id).await.unwrap();
        assert_eq!(info.players.len(), 2);
        assert_eq!(info.players[0].name, "Player1");
        assert_eq!(info.players[1].name, "Player2");

        match rx.try_recv().unwrap() {
            ServerMessage::RoomInfo(update) => assert_eq!(update.players.len(), 2),
            other => panic!("Expected RoomInfo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_room_errors() {
        let state = Arc::new(AppState::new(
            GameConfig {
                max_players: 2,
                ..GameConfig::default()
            },
            Arc::new(sounds()),
        ));
        let info = state.create_room(&conn("c1"), None).await.unwrap();

        assert_eq!(
            state.join_room(&conn("c2"), "AB1", None).await.unwrap_err(),
            GameError::InvalidPassword
        );

        let wrong = if info.password == "ZZZZ" { "YYYY" } else { "ZZZZ" };
        assert_eq!(
            state.join_room(&conn("c2"), wrong, None).await.unwrap_err(),
            GameError::RoomNotFound
        );

        state
            .join_room(&conn("c2"), &info.password, None)
            .await
            .unwrap();
        assert_eq!(
            state
                .join_room(&conn("c3"), &info.password, None)
                .await
                .unwrap_err(),
            GameError::RoomFull
        );
        assert!(state.connection_room(&conn("c3")).await.is_none());
    }

    #[tokio::test]
    async fn test_join_started_game_is_rejected() {
        let state = app_state();
        let info = state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();
        state
            .get_room(&room_id)
            .await
            .unwrap()
            .lock()
            .await
            .status = RoomStatus::Playing;

        assert_eq!(
            state
                .join_room(&conn("c2"), &info.password, None)
                .await
                .unwrap_err(),
            GameError::GameAlreadyStarted
        );
    }

    #[tokio::test]
    async fn test_identify_room_creates_and_renames() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();

        let info = state
            .identify_room(&conn("c2"), &room_id, None)
            .await
            .unwrap();
        assert_eq!(info.players[1].name, "Player2");

        let info = state
            .identify_room(&conn("c2"), &room_id, Some(" Bob ".to_string()))
            .await
            .unwrap();
        assert_eq!(info.players.len(), 2);
        assert_eq!(info.players[1].name, "Bob");

        assert_eq!(
            state
                .identify_room(&conn("c2"), "MISSING", None)
                .await
                .unwrap_err(),
            GameError::RoomNotFound
        );
    }

    #[tokio::test]
    async fn test_switching_rooms_leaves_previous_room() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let first = state.connection_room(&conn("c1")).await.unwrap();
        state.identify_room(&conn("c2"), &first, None).await.unwrap();

        state.create_room(&conn("c2"), None).await.unwrap();

        let info = state.room_info(&first).await.unwrap();
        assert_eq!(info.players.len(), 1);
        assert_ne!(state.connection_room(&conn("c2")).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_disconnect_updates_ready_count() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();
        state.identify_room(&conn("c2"), &room_id, None).await.unwrap();
        state.identify_room(&conn("c3"), &room_id, None).await.unwrap();
        state
            .set_player_ready(&conn("c2"), &room_id, true)
            .await
            .unwrap();

        state.disconnect(&conn("c2")).await;

        let info = state.room_info(&room_id).await.unwrap();
        assert_eq!(info.players.len(), 2);
        assert_eq!(info.ready_count, 0);
        assert!(state.connection_room(&conn("c2")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_deleted_after_grace() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();

        state.disconnect(&conn("c1")).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(state.get_room(&room_id).await.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(state.get_room(&room_id).await.is_none());
        assert_eq!(
            state.room_info(&room_id).await.unwrap_err(),
            GameError::RoomNotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_keeps_room() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();

        state.disconnect(&conn("c1")).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        state
            .identify_room(&conn("c1-again"), &room_id, Some("Alice".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let info = state.room_info(&room_id).await.unwrap();
        assert_eq!(info.players.len(), 1);
        assert_eq!(info.players[0].name, "Alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_rechecks_emptiness_when_timer_survives() {
        let state = app_state();
        state.create_room(&conn("c1"), None).await.unwrap();
        let room_id = state.connection_room(&conn("c1")).await.unwrap();
        state.disconnect(&conn("c1")).await;

        // Sneak a player in without cancelling the grace timer
        {
            let handle = state.get_room(&room_id).await.unwrap();
            let mut room = handle.lock().await;
            room.players
                .push(Player::new(conn("c9"), "Late".to_string()));
            assert!(room.timers.grace_pending());
        }
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(state.get_room(&room_id).await.is_some());
    }

    /// Every possible one-character room id, already taken
    fn full_store() -> HashMap<RoomId, RoomHandle> {
        "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
            .chars()
            .map(|c| {
                let handle = RoomHandle::new(Room::new(c.to_string(), "AB12".to_string(), 10));
                (handle.id.clone(), handle)
            })
            .collect()
    }

    #[test]
    fn test_pick_codes_gives_up_when_ids_run_out() {
        let rooms = full_store();
        assert_eq!(pick_codes(&rooms, 1).unwrap_err(), GameError::NoFreeRoomCode);

        let (room_id, password) = pick_codes(&HashMap::new(), 6).unwrap();
        assert_eq!(room_id.len(), 6);
        assert_eq!(password.len(), 4);
    }

    #[tokio::test]
    async fn test_create_room_fails_cleanly_when_ids_run_out() {
        let state = Arc::new(AppState::new(
            GameConfig {
                room_id_length: 1,
                ..GameConfig::default()
            },
            Arc::new(sounds()),
        ));
        *state.rooms.write().await = full_store();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            state.create_room(&conn("c1"), None),
        )
        .await
        .expect("create_room returns instead of spinning");
        assert_eq!(result.unwrap_err(), GameError::NoFreeRoomCode);

        // Store lock was released
        assert_eq!(state.room_count().await, 36);
        assert!(state.connection_room(&conn("c1")).await.is_none());
    }
}
