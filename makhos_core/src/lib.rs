//! Rules engine and game-playing AI for Thai checkers (Mak-hos).
//!
//! [`logic`] holds the board, move generation and the game state machine.
//! [`engine`] holds evaluation and the two searchers: alpha-beta with a
//! transposition table and quiescence, and Monte Carlo tree search.

pub mod engine;
pub mod logic;

pub use engine::{Evaluator, Move, MoveKind, SearchLimit, SearchResult, Searcher};
pub use logic::board::{Board, BoardCoordinate, Piece, PieceKind, Player};
pub use logic::game::{DrawRules, GameState, GameStatus, MoveRecord};
pub use logic::rules::MoveError;
