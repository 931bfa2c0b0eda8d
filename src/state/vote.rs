//! Voting engine: record and cancel votes, tally with a first-vote-order tie-break.

use super::AppState;
use super::timers;
use crate::error::{GameError, GameResult};
use crate::protocol::{Ballot, ServerMessage, VotedPlayer, VotingResults};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Vote counts per target, kept in the order each target first got a vote.
///
/// A target whose count drops to zero is removed; a later vote appends it
/// again at the end. The tally depends on this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteBook {
    entries: Vec<(PlayerId, u32)>,
}

/// Outcome of walking a [`VoteBook`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// First target to reach the highest count
    pub leader: Option<PlayerId>,
    pub max_votes: u32,
    pub tie: bool,
}

impl VoteBook {
    pub fn add(&mut self, target: &str) {
        match self.entries.iter_mut().find(|(id, _)| id == target) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((target.to_string(), 1)),
        }
    }

    /// Take one vote away from `target`, dropping the entry at zero
    pub fn remove(&mut self, target: &str) {
        if let Some(index) = self.entries.iter().position(|(id, _)| id == target) {
            self.entries[index].1 -= 1;
            if self.entries[index].1 == 0 {
                self.entries.remove(index);
            }
        }
    }

    pub fn count(&self, target: &str) -> u32 {
        self.entries
            .iter()
            .find(|(id, _)| id == target)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn counts(&self) -> HashMap<PlayerId, u32> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, u32)> {
        self.entries.iter().map(|(id, count)| (id, *count))
    }

    /// A strictly higher count takes the lead and clears the tie; an equal
    /// non-zero count marks a tie but keeps the earlier leader.
    pub fn tally(&self) -> Tally {
        let mut leader = None;
        let mut max_votes = 0;
        let mut tie = false;

        for (target, count) in self.iter() {
            if count > max_votes {
                leader = Some(target.clone());
                max_votes = count;
                tie = false;
            } else if count == max_votes && max_votes > 0 {
                tie = true;
            }
        }

        Tally {
            leader,
            max_votes,
            tie,
        }
    }
}

impl Room {
    /// Record `voter`'s vote, replacing any earlier one
    pub fn cast_vote(&mut self, voter: &str, target: &str) -> GameResult<()> {
        if self.status != RoomStatus::Voting {
            return Err(GameError::VotingNotActive);
        }
        if !self.has_player(target) {
            return Err(GameError::PlayerNotFound);
        }

        let player = self.player_mut(voter).ok_or(GameError::PlayerNotFound)?;
        let previous = player.voted_for.replace(target.to_string());
        player.has_voted = true;

        match previous {
            // Same target again must not move it in the first-vote order
            Some(previous) if previous == target => return Ok(()),
            Some(previous) => self.votes.remove(&previous),
            None => {}
        }
        self.votes.add(target);
        Ok(())
    }

    /// Retract `voter`'s vote
    pub fn cancel_vote(&mut self, voter: &str) -> GameResult<()> {
        if self.status != RoomStatus::Voting {
            return Err(GameError::VotingNotActive);
        }

        let player = self.player_mut(voter).ok_or(GameError::PlayerNotFound)?;
        if !player.has_voted {
            return Err(GameError::NoVoteToCancel);
        }
        player.has_voted = false;

        if let Some(previous) = player.voted_for.take() {
            self.votes.remove(&previous);
        }
        Ok(())
    }

    pub fn all_voted(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.has_voted)
    }

    pub fn voted_players(&self) -> Vec<VotedPlayer> {
        self.players
            .iter()
            .filter(|p| p.has_voted)
            .map(|p| VotedPlayer {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.player(id).map(|p| p.name.clone())
    }

    /// Compute the reveal payload from the current ballots
    pub fn voting_results(&self) -> VotingResults {
        let tally = self.votes.tally();

        let suspected_impostor = tally
            .leader
            .as_deref()
            .and_then(|id| self.player(id))
            .cloned();
        let actual_impostor = self
            .impostor_id
            .as_deref()
            .and_then(|id| self.player(id))
            .cloned()
            .map(|mut player| {
                player.role = PlayerRole::Impostor;
                player
            });

        let voting_results = self
            .players
            .iter()
            .filter_map(|voter| {
                let target = voter.voted_for.as_ref()?;
                Some((
                    voter.id.clone(),
                    Ballot {
                        voter_name: voter.name.clone(),
                        voted_for: target.clone(),
                        voted_for_name: self.name_of(target),
                    },
                ))
            })
            .collect();

        let was_correct = !tally.tie
            && tally.leader.is_some()
            && tally.leader.as_deref() == self.impostor_id.as_deref();

        VotingResults {
            suspected_impostor,
            actual_impostor,
            actual_impostor_id: self.impostor_id.clone(),
            votes: self.votes.counts(),
            voting_results,
            was_correct,
            was_tie: tally.tie,
        }
    }

    /// Drop a pending tally. Bumping the generation makes a callback that
    /// already started waiting on the lock give up.
    pub(crate) fn disarm_tally(&mut self) {
        if self.timers.phase_pending() {
            self.timers.cancel_phase();
            self.generation += 1;
        }
    }

    fn voting_update(&self) -> ServerMessage {
        ServerMessage::VotingUpdated {
            voted_players: self.voted_players(),
            total_players: self.players.len(),
        }
    }
}

impl AppState {
    /// Handle vote-impostor. The returned acknowledgment goes to the voter only.
    pub async fn vote_impostor(
        self: &Arc<Self>,
        conn: &ConnectionId,
        room_id: &str,
        target: &str,
    ) -> GameResult<ServerMessage> {
        let handle = self.require_room(room_id).await?;
        let mut room = handle.lock_open().await?;

        room.cast_vote(conn, target)?;
        tracing::info!("Player {} voted for {} in room {}", conn, target, room.id);

        self.broadcast_to_room(&room, room.voting_update()).await;

        if room.all_voted() {
            tracing::debug!("All players voted in room {}, tally pending", room.id);
            timers::arm_tally(self, &mut room);
        }

        Ok(ServerMessage::PrivateVoteUpdate {
            voted_for: target.to_string(),
        })
    }

    /// Handle cancel-vote
    pub async fn cancel_vote(
        self: &Arc<Self>,
        conn: &ConnectionId,
        room_id: &str,
    ) -> GameResult<ServerMessage> {
        let handle = self.require_room(room_id).await?;
        let mut room = handle.lock_open().await?;

        room.cancel_vote(conn)?;
        tracing::info!("Player {} cancelled their vote in room {}", conn, room.id);

        // No longer fully voted
        room.disarm_tally();

        self.broadcast_to_room(&room, room.voting_update()).await;
        Ok(ServerMessage::VoteCancelled)
    }

    /// Tally timer callback: reveal results, then Voting -> Waiting
    pub(crate) async fn run_tally(&self, room_id: &str, generation: u64) {
        let Some(handle) = self.get_room(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        if room.closed || room.generation != generation || room.status != RoomStatus::Voting {
            tracing::debug!("Stale tally for room {}", room_id);
            return;
        }
        room.timers.release_phase();

        let results = room.voting_results();
        tracing::info!(
            "Voting finished in room {}: correct={} tie={}",
            room.id,
            results.was_correct,
            results.was_tie
        );
        self.broadcast_to_room(&room, ServerMessage::VotingResults(results))
            .await;

        room.finish_round();
        self.broadcast_room_info(&room).await;
    }

    /// Send the current voting progress to a room (used when a voter leaves)
    pub(crate) async fn broadcast_voting_update(&self, room: &Room) {
        self.broadcast_to_room(room, room.voting_update()).await;
    }
}
