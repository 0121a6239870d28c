pub mod board;

pub use board::{Board, Evaluation, Mark, Winner, evaluate};
