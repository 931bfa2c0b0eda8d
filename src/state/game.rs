//! Room lifecycle: Waiting -> Preparing -> Playing -> Voting -> Waiting.
//!
//! Waiting -> Preparing happens when the last player readies up. The rest is
//! driven by timers; the return to Waiting happens when the tally completes
//! (see `vote.rs`).

use super::timers;
use super::AppState;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::Rng;
use std::sync::Arc;

impl Room {
    /// Set a player's readiness. Returns whether anything changed.
    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> GameResult<bool> {
        if !self.has_player(player_id) {
            return Err(GameError::PlayerNotFound);
        }
        if self.status != RoomStatus::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }

        let player = self
            .player_mut(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if player.is_ready == ready {
            return Ok(false);
        }
        player.is_ready = ready;

        if ready {
            self.ready_count += 1;
        } else {
            self.ready_count -= 1;
        }
        Ok(true)
    }

    /// Everyone is ready and there are at least two players
    pub fn quorum_reached(&self) -> bool {
        self.players.len() >= 2 && self.ready_count == self.players.len()
    }

    /// Pick the impostor uniformly at random and enter Preparing.
    ///
    /// Returns the impostor's id, or `None` for an empty room.
    pub(crate) fn begin_preparing(&mut self, sounds: RoundSounds) -> Option<PlayerId> {
        if self.players.is_empty() {
            return None;
        }

        let impostor_index = rand::rng().random_range(0..self.players.len());
        for (index, player) in self.players.iter_mut().enumerate() {
            player.role = if index == impostor_index {
                PlayerRole::Impostor
            } else {
                PlayerRole::Crewmate
            };
        }

        let impostor_id = self.players[impostor_index].id.clone();
        self.impostor_id = Some(impostor_id.clone());
        self.current_sounds = Some(sounds);
        self.set_status(RoomStatus::Preparing);
        Some(impostor_id)
    }

    pub(crate) fn begin_playing(&mut self) {
        self.set_status(RoomStatus::Playing);
    }

    /// Reset readiness, roles and ballots, then open voting
    pub(crate) fn begin_voting(&mut self) {
        for player in &mut self.players {
            player.is_ready = false;
            player.role = PlayerRole::Crewmate;
            player.has_voted = false;
            player.voted_for = None;
        }
        self.ready_count = 0;
        self.votes.clear();
        self.set_status(RoomStatus::Voting);
    }

    /// Back to Waiting once results are out
    pub(crate) fn finish_round(&mut self) {
        self.impostor_id = None;
        for player in &mut self.players {
            player.has_voted = false;
            player.voted_for = None;
        }
        self.votes.clear();
        self.set_status(RoomStatus::Waiting);
    }

    /// Drop an unfinished round entirely (the room emptied mid-game)
    pub(crate) fn abandon_round(&mut self) {
        for player in &mut self.players {
            player.is_ready = false;
            player.role = PlayerRole::Crewmate;
        }
        self.ready_count = 0;
        self.current_sounds = None;
        self.finish_round();
    }

    pub fn impostor_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.role == PlayerRole::Impostor)
            .count()
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    duration.as_millis() as u64
}

impl AppState {
    /// Handle player-ready / player-unready.
    ///
    /// Returns the private confirmation for the sender, or `None` when the
    /// player was already in the requested state.
    pub async fn set_player_ready(
        self: &Arc<Self>,
        conn: &ConnectionId,
        room_id: &str,
        ready: bool,
    ) -> GameResult<Option<ServerMessage>> {
        let handle = self.require_room(room_id).await?;
        let mut room = handle.lock_open().await?;

        if !room.set_ready(conn, ready)? {
            return Ok(None);
        }
        tracing::info!(
            "Player {} ready={} in room {}: {}/{}",
            conn,
            ready,
            room.id,
            room.ready_count,
            room.players.len()
        );

        self.broadcast_room_info(&room).await;

        if ready && room.quorum_reached() {
            self.start_game(&mut room).await;
        }

        Ok(Some(ServerMessage::ReadyStatusChanged { is_ready: ready }))
    }

    /// Waiting -> Preparing
    async fn start_game(self: &Arc<Self>, room: &mut Room) {
        let sounds = RoundSounds {
            impostor: self.sounds.random_impostor_sound(),
            crewmate: self.sounds.random_crewmate_sound(),
            countdown: self.sounds.countdown_sound(),
            round_end: self.sounds.round_end_sound(),
        };
        let countdown_sound = sounds.countdown.clone();

        let Some(impostor_id) = room.begin_preparing(sounds) else {
            return;
        };
        tracing::info!("Starting game in room {}, impostor {}", room.id, impostor_id);

        let prepare_time = millis(self.config.prepare_duration);
        if let Some(sound) = countdown_sound {
            self.broadcast_to_room(
                room,
                ServerMessage::PlayCountdown {
                    sound,
                    prepare_time,
                },
            )
            .await;
        }
        self.broadcast_to_room(
            room,
            ServerMessage::GameStarting {
                prepare_time,
                countdown: self.config.prepare_countdown(),
            },
        )
        .await;

        timers::arm_prepare_countdown(self, room);
    }

    /// Countdown timer callback. Returns whether the countdown should continue.
    pub(crate) async fn on_countdown_tick(
        self: &Arc<Self>,
        room_id: &str,
        generation: u64,
        remaining: u64,
    ) -> bool {
        let Some(handle) = self.get_room(room_id).await else {
            return false;
        };
        let mut room = handle.lock().await;
        if room.closed || room.generation != generation || room.status != RoomStatus::Preparing
        {
            tracing::debug!("Stale countdown tick for room {}", room_id);
            return false;
        }

        if remaining > 0 {
            self.broadcast_to_room(
                &room,
                ServerMessage::CountdownUpdate {
                    countdown: remaining,
                },
            )
            .await;
            return true;
        }

        room.timers.release_phase();
        self.begin_playing(&mut room).await;
        false
    }

    /// Preparing -> Playing: every player privately gets their own cue
    async fn begin_playing(self: &Arc<Self>, room: &mut Room) {
        room.begin_playing();
        tracing::info!("Round playing in room {}", room.id);

        let sounds = room.current_sounds.clone().unwrap_or_default();
        let duration = millis(self.config.round_duration);
        for player in &room.players {
            let sound = match player.role {
                PlayerRole::Impostor => sounds.impostor.clone(),
                PlayerRole::Crewmate => sounds.crewmate.clone(),
            };
            self.gateway
                .send_to(
                    &player.id,
                    ServerMessage::PlayMusic {
                        sound,
                        role: player.role,
                        duration,
                    },
                )
                .await;
        }

        timers::arm_round_timer(self, room);
    }

    /// Round timer callback: Playing -> Voting
    pub(crate) async fn on_round_timer(self: &Arc<Self>, room_id: &str, generation: u64) {
        let Some(handle) = self.get_room(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        if room.closed || room.generation != generation || room.status != RoomStatus::Playing {
            tracing::debug!("Stale round timer for room {}", room_id);
            return;
        }

        room.timers.release_phase();
        self.begin_voting(&mut room).await;
    }

    async fn begin_voting(&self, room: &mut Room) {
        tracing::info!("Round over in room {}, voting opens", room.id);

        let round_end = room
            .current_sounds
            .as_ref()
            .and_then(|sounds| sounds.round_end.clone());
        if let Some(sound) = round_end {
            self.broadcast_to_room(room, ServerMessage::PlayRoundEnd { sound })
                .await;
        }

        room.begin_voting();

        self.broadcast_to_room(
            room,
            ServerMessage::VotingStarted {
                players: room.roster(),
                voted_players: room.voted_players(),
            },
        )
        .await;
        self.broadcast_room_info(room).await;
    }
}
