//! Persisted room state and the components that act on it.

pub mod manager;
pub mod reaper;
pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::game::{Board, Mark, Winner};
use crate::util::clock::now_ms;

/// A pair of per-slot values addressed by [`Mark`].
///
/// Every "maybe present" slot value lives behind a total accessor as an
/// explicit `Option`, instead of the null-checked `{X, O}` objects the wire
/// format suggests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerMark<T> {
    pub x: T,
    pub o: T,
}

impl<T> PerMark<T> {
    pub fn get(&self, mark: Mark) -> &T {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }

    pub fn get_mut(&mut self, mark: Mark) -> &mut T {
        match mark {
            Mark::X => &mut self.x,
            Mark::O => &mut self.o,
        }
    }

    /// Exchange the X and O values.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.x, &mut self.o);
    }
}

/// One game session, persisted across disconnects and process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub players: PerMark<Option<String>>,
    pub board: Board,
    pub current_player: Mark,
    pub winner: Option<Winner>,
    /// Unix milliseconds of the last mutating event; drives eviction.
    pub last_activity: i64,
    pub rematch_votes: PerMark<bool>,
}

impl Room {
    /// A fresh room: empty board, both slots open, X to move.
    pub fn new(room_id: impl Into<String>, board_size: usize) -> Room {
        Room {
            room_id: room_id.into(),
            players: PerMark::default(),
            board: Board::empty(board_size),
            current_player: Mark::X,
            winner: None,
            last_activity: now_ms(),
            rematch_votes: PerMark::default(),
        }
    }

    /// The slot this username already occupies, if any.
    pub fn slot_of(&self, username: &str) -> Option<Mark> {
        if self.players.x.as_deref() == Some(username) {
            Some(Mark::X)
        } else if self.players.o.as_deref() == Some(username) {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// The first open slot, X before O.
    pub fn vacant_slot(&self) -> Option<Mark> {
        if self.players.x.is_none() {
            Some(Mark::X)
        } else if self.players.o.is_none() {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn has_both_occupants(&self) -> bool {
        self.players.x.is_some() && self.players.o.is_some()
    }

    pub fn rematch_ready(&self) -> bool {
        self.rematch_votes.x && self.rematch_votes.o
    }

    pub fn touch(&mut self) {
        self.last_activity = now_ms();
    }

    /// Check a client-submitted board against the stored one.
    ///
    /// Returns the coordinates of the single new cell on success, or the
    /// reason for rejection. The submitted grid is never applied as-is; the
    /// caller stamps the validated cell onto the stored board.
    pub fn validate_move(&self, mover: Mark, proposed: &Board) -> Result<(usize, usize), &'static str> {
        if !proposed.is_square() || proposed.size() != self.board.size() {
            return Err("board shape mismatch");
        }
        if self.winner.is_some() {
            return Err("game already finished");
        }
        if !self.has_both_occupants() {
            return Err("waiting for opponent");
        }
        if self.current_player != mover {
            return Err("not this player's turn");
        }
        match self.board.changed_cells(proposed).as_slice() {
            [] => Err("no cell changed"),
            &[(row, col)] => {
                if self.board.cell(row, col).is_some() {
                    Err("cell already occupied")
                } else if proposed.cell(row, col) != Some(mover) {
                    Err("cell does not carry the mover's mark")
                } else {
                    Ok((row, col))
                }
            }
            _ => Err("more than one cell changed"),
        }
    }

    /// Reset for a rematch: fresh board, slots swapped, X to move, votes
    /// cleared.
    pub fn reset_for_rematch(&mut self) {
        self.board = Board::empty(self.board.size());
        self.players.swap();
        self.current_player = Mark::X;
        self.winner = None;
        self.rematch_votes = PerMark::default();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied_room() -> Room {
        let mut room = Room::new("r1", 3);
        room.players.x = Some("alice".into());
        room.players.o = Some("bob".into());
        room
    }

    #[test]
    fn slots_fill_x_first() {
        let mut room = Room::new("r1", 3);
        assert_eq!(room.vacant_slot(), Some(Mark::X));
        room.players.x = Some("alice".into());
        assert_eq!(room.vacant_slot(), Some(Mark::O));
        room.players.o = Some("bob".into());
        assert_eq!(room.vacant_slot(), None);
    }

    #[test]
    fn slot_of_finds_occupants() {
        let room = occupied_room();
        assert_eq!(room.slot_of("alice"), Some(Mark::X));
        assert_eq!(room.slot_of("bob"), Some(Mark::O));
        assert_eq!(room.slot_of("carol"), None);
    }

    #[test]
    fn move_accepted_onto_empty_cell_in_turn() {
        let room = occupied_room();
        let mut proposed = room.board.clone();
        proposed.set(0, 0, Mark::X);
        assert_eq!(room.validate_move(Mark::X, &proposed), Ok((0, 0)));
    }

    #[test]
    fn move_rejected_out_of_turn() {
        let room = occupied_room();
        let mut proposed = room.board.clone();
        proposed.set(0, 0, Mark::O);
        assert_eq!(room.validate_move(Mark::O, &proposed), Err("not this player's turn"));
    }

    #[test]
    fn move_rejected_onto_occupied_cell() {
        let mut room = occupied_room();
        room.board.set(1, 1, Mark::O);
        let mut proposed = room.board.clone();
        // overwrite the occupied center
        proposed.set(1, 1, Mark::X);
        assert_eq!(room.validate_move(Mark::X, &proposed), Err("cell already occupied"));
    }

    #[test]
    fn move_rejected_when_more_than_one_cell_changes() {
        let room = occupied_room();
        let mut proposed = room.board.clone();
        proposed.set(0, 0, Mark::X);
        proposed.set(2, 2, Mark::X);
        assert_eq!(
            room.validate_move(Mark::X, &proposed),
            Err("more than one cell changed")
        );
    }

    #[test]
    fn move_rejected_without_opponent() {
        let mut room = Room::new("r1", 3);
        room.players.x = Some("alice".into());
        let mut proposed = room.board.clone();
        proposed.set(0, 0, Mark::X);
        assert_eq!(room.validate_move(Mark::X, &proposed), Err("waiting for opponent"));
    }

    #[test]
    fn move_rejected_after_game_finished() {
        let mut room = occupied_room();
        room.winner = Some(Winner::X);
        let mut proposed = room.board.clone();
        proposed.set(0, 0, Mark::O);
        assert_eq!(room.validate_move(Mark::O, &proposed), Err("game already finished"));
    }

    #[test]
    fn move_rejected_on_shape_mismatch() {
        let room = occupied_room();
        let proposed = Board::empty(4);
        assert_eq!(room.validate_move(Mark::X, &proposed), Err("board shape mismatch"));
    }

    #[test]
    fn rematch_reset_swaps_slots_and_clears_state() {
        let mut room = occupied_room();
        room.board.set(0, 0, Mark::X);
        room.winner = Some(Winner::X);
        room.current_player = Mark::O;
        room.rematch_votes = PerMark { x: true, o: true };

        room.reset_for_rematch();

        assert_eq!(room.players.x.as_deref(), Some("bob"));
        assert_eq!(room.players.o.as_deref(), Some("alice"));
        assert_eq!(room.board, Board::empty(3));
        assert_eq!(room.current_player, Mark::X);
        assert_eq!(room.winner, None);
        assert!(!room.rematch_votes.x && !room.rematch_votes.o);
    }
}
