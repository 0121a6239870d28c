//! Game flow: joins, moves, rematches, disconnects and idle eviction.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use ulid::Ulid;

use super::registry::{ConnHandle, ConnectionRegistry};
use super::store::{RoomStore, StoreError};
use super::Room;
use crate::game::{evaluate, Board, Mark, Winner};
use crate::util::clock::now_ms;
use crate::ws::protocol::ServerMessage;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("room is full")]
    RoomFull,
    #[error("no such room {0}")]
    UnknownRoom(String),
    #[error("invalid move: {0}")]
    InvalidMove(&'static str),
    #[error("store timed out")]
    StoreTimeout,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns every room mutation.
///
/// All mutating paths take the room's async mutex before loading and hold it
/// through persist and broadcast, so events for one room never interleave.
/// Different rooms proceed in parallel. Disconnects skip the lock entirely:
/// they only compare connection ids inside the registry.
pub struct RoomManager {
    store: Arc<dyn RoomStore>,
    registry: ConnectionRegistry,
    locks: DashMap<String, Arc<Mutex<()>>>,
    board_size: usize,
    persist_timeout: Duration,
}

impl RoomManager {
    pub fn new(store: Arc<dyn RoomStore>, board_size: usize, persist_timeout: Duration) -> RoomManager {
        RoomManager {
            store,
            registry: ConnectionRegistry::new(),
            locks: DashMap::new(),
            board_size,
            persist_timeout,
        }
    }

    /// Put `username` into a slot of `room_id`, creating the room on first
    /// contact. Reconnects land on their old slot. Replies `joined` to the
    /// caller and pushes the room state to both slots.
    pub async fn join(&self, room_id: &str, username: &str, handle: ConnHandle) -> Result<Mark, GameError> {
        let guard = self.lock_room(room_id).await;
        let result = self.join_locked(room_id, username, handle).await;
        self.unlock_room(room_id, guard);
        result
    }

    async fn join_locked(&self, room_id: &str, username: &str, handle: ConnHandle) -> Result<Mark, GameError> {
        let mut room = self
            .load(room_id)
            .await?
            .unwrap_or_else(|| Room::new(room_id, self.board_size));
        let mark = match room.slot_of(username) {
            Some(mark) => mark,
            None => match room.vacant_slot() {
                Some(mark) => {
                    *room.players.get_mut(mark) = Some(username.to_string());
                    mark
                }
                None => return Err(GameError::RoomFull),
            },
        };
        room.touch();
        // Persist before exposing the handle, so a failed save leaves no
        // registry entry behind.
        self.save(&room).await?;
        self.registry.register(room_id, mark, handle);
        self.registry
            .send_to(room_id, mark, &ServerMessage::Joined { player: mark });
        self.registry.broadcast(
            room_id,
            &ServerMessage::update(room.board.clone(), room.current_player, room.winner),
        );
        info!(room = %room_id, user = %username, slot = ?mark, "player joined");
        Ok(mark)
    }

    /// Validate a submitted grid against the stored room, apply the one new
    /// cell, re-derive the winner and broadcast the result.
    ///
    /// The caller's winner claim is never trusted; a disagreeing claim is
    /// logged and overridden.
    pub async fn apply_move(
        &self,
        room_id: &str,
        username: &str,
        proposed: &Board,
        claimed_winner: Option<Winner>,
    ) -> Result<(), GameError> {
        let guard = self.lock_room(room_id).await;
        let result = self
            .apply_move_locked(room_id, username, proposed, claimed_winner)
            .await;
        self.unlock_room(room_id, guard);
        result
    }

    async fn apply_move_locked(
        &self,
        room_id: &str,
        username: &str,
        proposed: &Board,
        claimed_winner: Option<Winner>,
    ) -> Result<(), GameError> {
        let mut room = self
            .load(room_id)
            .await?
            .ok_or_else(|| GameError::UnknownRoom(room_id.to_string()))?;
        let mover = room
            .slot_of(username)
            .ok_or(GameError::InvalidMove("sender does not occupy a slot"))?;
        let (row, col) = room.validate_move(mover, proposed).map_err(GameError::InvalidMove)?;

        room.board.set(row, col, mover);
        room.winner = evaluate(&room.board).winner();
        if claimed_winner != room.winner {
            warn!(
                room = %room_id,
                claimed = ?claimed_winner,
                derived = ?room.winner,
                "winner claim overridden"
            );
        }
        room.current_player = mover.opponent();
        room.touch();
        self.save(&room).await?;
        self.registry.broadcast(
            room_id,
            &ServerMessage::update(room.board.clone(), room.current_player, room.winner),
        );
        debug!(room = %room_id, user = %username, row, col, winner = ?room.winner, "move applied");
        Ok(())
    }

    /// Record a rematch vote. Once both slots have voted the room resets,
    /// the occupants trade marks and each side is told its new one.
    pub async fn play_again(&self, room_id: &str, username: &str) -> Result<(), GameError> {
        let guard = self.lock_room(room_id).await;
        let result = self.play_again_locked(room_id, username).await;
        self.unlock_room(room_id, guard);
        result
    }

    async fn play_again_locked(&self, room_id: &str, username: &str) -> Result<(), GameError> {
        let mut room = self
            .load(room_id)
            .await?
            .ok_or_else(|| GameError::UnknownRoom(room_id.to_string()))?;
        let Some(mark) = room.slot_of(username) else {
            debug!(room = %room_id, user = %username, "rematch vote from non-occupant ignored");
            return Ok(());
        };
        *room.rematch_votes.get_mut(mark) = true;
        room.touch();

        if !room.rematch_ready() {
            self.save(&room).await?;
            debug!(room = %room_id, user = %username, "rematch vote recorded");
            return Ok(());
        }

        room.reset_for_rematch();
        self.save(&room).await?;
        self.registry.swap_slots(room_id);
        for mark in [Mark::X, Mark::O] {
            self.registry.send_to(
                room_id,
                mark,
                &ServerMessage::Update {
                    board: room.board.clone(),
                    current_player: room.current_player,
                    winner: room.winner,
                    player: Some(mark),
                },
            );
        }
        info!(room = %room_id, "rematch started, marks swapped");
        Ok(())
    }

    /// Detach a closed socket from its slot. Room state stays put so the
    /// player can rejoin; a slot already taken over by a newer connection is
    /// left alone.
    pub fn disconnect(&self, room_id: &str, conn_id: Ulid) {
        if let Some(mark) = self.registry.clear_connection(room_id, conn_id) {
            debug!(room = %room_id, slot = ?mark, "connection detached");
        }
    }

    /// Delete rooms idle longer than `ttl` and drop their live handles.
    /// Staleness is re-checked under the room lock, so a join racing the
    /// sweep wins. Returns how many rooms went away.
    pub async fn sweep_idle(&self, ttl: Duration) -> Result<usize, GameError> {
        let cutoff = now_ms() - ttl.as_millis() as i64;
        let candidates = self.idle_ids(cutoff).await?;
        let mut evicted = 0;
        for room_id in candidates {
            let guard = self.lock_room(&room_id).await;
            let result = self.evict_if_stale(&room_id, cutoff).await;
            self.unlock_room(&room_id, guard);
            match result {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(err) => warn!(room = %room_id, error = %err, "eviction failed"),
            }
        }
        Ok(evicted)
    }

    async fn evict_if_stale(&self, room_id: &str, cutoff_ms: i64) -> Result<bool, GameError> {
        let Some(room) = self.load(room_id).await? else {
            return Ok(false);
        };
        if room.last_activity >= cutoff_ms {
            return Ok(false);
        }
        self.delete(room_id).await?;
        self.registry.remove_room(room_id);
        info!(room = %room_id, "evicted idle room");
        Ok(true)
    }

    async fn lock_room(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(room_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop the guard, then drop the map entry if nobody else is waiting.
    fn unlock_room(&self, room_id: &str, guard: OwnedMutexGuard<()>) {
        drop(guard);
        self.locks
            .remove_if(room_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn load(&self, room_id: &str) -> Result<Option<Room>, GameError> {
        timeout(self.persist_timeout, self.store.load(room_id))
            .await
            .map_err(|_| GameError::StoreTimeout)?
            .map_err(GameError::from)
    }

    async fn save(&self, room: &Room) -> Result<(), GameError> {
        timeout(self.persist_timeout, self.store.save(room))
            .await
            .map_err(|_| GameError::StoreTimeout)?
            .map_err(GameError::from)
    }

    async fn delete(&self, room_id: &str) -> Result<(), GameError> {
        timeout(self.persist_timeout, self.store.delete(room_id))
            .await
            .map_err(|_| GameError::StoreTimeout)?
            .map_err(GameError::from)
    }

    async fn idle_ids(&self, cutoff_ms: i64) -> Result<Vec<String>, GameError> {
        timeout(self.persist_timeout, self.store.idle_room_ids(cutoff_ms))
            .await
            .map_err(|_| GameError::StoreTimeout)?
            .map_err(GameError::from)
    }
}
