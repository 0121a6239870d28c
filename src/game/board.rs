//! Board representation and win/draw evaluation.

use serde::{Deserialize, Serialize};

/// A player's symbol, doubling as the name of the slot it plays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// Outcome of a finished game as it appears on the wire and in the store:
/// `"X"`, `"O"` or `"Draw"` (absent while the game is still running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    Draw,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

/// An N×N grid of cells, each empty or holding a mark.
///
/// Serializes as nested arrays of `null | "X" | "O"`, the shape the client
/// submits and the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: Vec<Vec<Option<Mark>>>,
}

impl Board {
    /// An empty `size`×`size` board.
    pub fn empty(size: usize) -> Board {
        Board { cells: vec![vec![None; size]; size] }
    }

    /// Number of rows. Only meaningful when [`Board::is_square`] holds, which
    /// deserialized client boards must be checked for.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn is_square(&self) -> bool {
        let n = self.cells.len();
        self.cells.iter().all(|row| row.len() == n)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Mark> {
        self.cells[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, mark: Mark) {
        self.cells[row][col] = Some(mark);
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|cell| cell.is_some())
    }

    /// Coordinates where `next` differs from `self`. Both boards must have
    /// the same shape.
    pub fn changed_cells(&self, next: &Board) -> Vec<(usize, usize)> {
        let n = self.size();
        let mut changed = Vec::new();
        for row in 0..n {
            for col in 0..n {
                if self.cells[row][col] != next.cells[row][col] {
                    changed.push((row, col));
                }
            }
        }
        changed
    }
}

/// Result of evaluating a board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    InProgress,
    Win(Mark),
    Draw,
}

impl Evaluation {
    /// The value stored and broadcast as the room's `winner` field.
    pub fn winner(self) -> Option<Winner> {
        match self {
            Evaluation::InProgress => None,
            Evaluation::Win(mark) => Some(mark.into()),
            Evaluation::Draw => Some(Winner::Draw),
        }
    }
}

/// Evaluate a board: a row, column or diagonal uniformly holding one mark is
/// a win for that mark; a full board without one is a draw.
///
/// Under alternating play at most one mark can own a full line, so scan order
/// does not matter. Pure and O(N²).
pub fn evaluate(board: &Board) -> Evaluation {
    let n = board.size();

    for row in 0..n {
        if let Some(mark) = line_owner((0..n).map(|col| board.cell(row, col))) {
            return Evaluation::Win(mark);
        }
    }
    for col in 0..n {
        if let Some(mark) = line_owner((0..n).map(|row| board.cell(row, col))) {
            return Evaluation::Win(mark);
        }
    }
    if let Some(mark) = line_owner((0..n).map(|i| board.cell(i, i))) {
        return Evaluation::Win(mark);
    }
    if let Some(mark) = line_owner((0..n).map(|i| board.cell(i, n - 1 - i))) {
        return Evaluation::Win(mark);
    }

    if board.is_full() { Evaluation::Draw } else { Evaluation::InProgress }
}

/// The mark occupying every cell of the line, if any.
fn line_owner(mut cells: impl Iterator<Item = Option<Mark>>) -> Option<Mark> {
    let first = cells.next().flatten()?;
    cells.all(|cell| cell == Some(first)).then_some(first)
}
