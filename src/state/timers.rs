//! Per-room timers driving automatic transitions.
//!
//! A room has at most one phase timer (prepare countdown, round timer or
//! tally delay) and one grace-deletion timer. Timers are spawned tasks whose
//! abort handles live on the room. Aborting is best effort: a task may
//! already be waiting on the room lock, so every callback re-checks the
//! room's `generation` and status once it holds the lock.

use super::AppState;
use crate::types::{Room, RoomId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub(crate) struct RoomTimers {
    phase: Option<AbortHandle>,
    grace: Option<AbortHandle>,
}

impl RoomTimers {
    fn set_phase(&mut self, handle: AbortHandle) {
        self.cancel_phase();
        self.phase = Some(handle);
    }

    pub(crate) fn cancel_phase(&mut self) {
        if let Some(handle) = self.phase.take() {
            handle.abort();
        }
    }

    /// Forget the phase timer without aborting it.
    ///
    /// Called by the running timer itself before it transitions the room, so
    /// the transition does not abort the task that is performing it.
    pub(crate) fn release_phase(&mut self) {
        self.phase = None;
    }

    pub(crate) fn phase_pending(&self) -> bool {
        self.phase
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn set_grace(&mut self, handle: AbortHandle) {
        self.cancel_grace();
        self.grace = Some(handle);
    }

    pub(crate) fn cancel_grace(&mut self) {
        if let Some(handle) = self.grace.take() {
            handle.abort();
        }
    }

    pub(crate) fn release_grace(&mut self) {
        self.grace = None;
    }

    pub(crate) fn grace_pending(&self) -> bool {
        self.grace
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub(crate) fn cancel_all(&mut self) {
        self.cancel_phase();
        self.cancel_grace();
    }
}

/// Tick the prepare countdown once per second, then start the round
pub(crate) fn arm_prepare_countdown(state: &Arc<AppState>, room: &mut Room) {
    let state = state.clone();
    let room_id = room.id.clone();
    let generation = room.generation;
    let mut remaining = state.config.prepare_countdown();

    let task = tokio::spawn(async move {
        loop {
            if remaining > 0 {
                tokio::time::sleep(TICK).await;
                remaining -= 1;
            }
            let keep_going = state
                .on_countdown_tick(&room_id, generation, remaining)
                .await;
            if !keep_going || remaining == 0 {
                break;
            }
        }
    });

    room.timers.set_phase(task.abort_handle());
}

/// End the round after the configured round duration
pub(crate) fn arm_round_timer(state: &Arc<AppState>, room: &mut Room) {
    let state = state.clone();
    let room_id = room.id.clone();
    let generation = room.generation;
    let duration = state.config.round_duration;

    let task = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        state.on_round_timer(&room_id, generation).await;
    });

    room.timers.set_phase(task.abort_handle());
}

/// Reveal results after a short pause.
///
/// Keeps an already pending tally instead of pushing it back.
pub(crate) fn arm_tally(state: &Arc<AppState>, room: &mut Room) {
    if room.timers.phase_pending() {
        return;
    }

    let state = state.clone();
    let room_id = room.id.clone();
    let generation = room.generation;
    let delay = state.config.reveal_delay;

    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        state.run_tally(&room_id, generation).await;
    });

    room.timers.set_phase(task.abort_handle());
}

/// Delete the room if it is still empty once the grace period ends
pub(crate) fn arm_grace_deletion(state: &Arc<AppState>, room: &mut Room) {
    let state = state.clone();
    let room_id: RoomId = room.id.clone();
    let grace = state.config.empty_room_grace;

    let task = tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        state.delete_if_empty(&room_id).await;
    });

    room.timers.set_grace(task.abort_handle());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_phase_aborts_task() {
        let mut timers = RoomTimers::default();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        timers.set_phase(task.abort_handle());
        assert!(timers.phase_pending());

        timers.cancel_phase();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!timers.phase_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_keeps_task_running() {
        let mut timers = RoomTimers::default();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        });
        timers.set_grace(task.abort_handle());
        timers.release_grace();
        timers.cancel_all();

        assert_eq!(task.await.unwrap(), 7);
        assert!(!timers.grace_pending());
    }
}
