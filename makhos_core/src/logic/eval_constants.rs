// Material
pub const VAL_MAN: i32 = 100;
pub const VAL_KING: i32 = 300;

// Positional weights
pub const CENTER_CONTROL: i32 = 5;
pub const MOBILITY: i32 = 15;
pub const BACK_ROW_BONUS: i32 = 10;
pub const ADVANCEMENT: i32 = 12;
pub const EDGE_PENALTY: i32 = -8;
pub const CORNER_PENALTY: i32 = -15;
pub const TEMPO: i32 = 3;

// Tactics
pub const ATTACK_THREAT: i32 = 25;
pub const PIECE_UNDER_ATTACK: i32 = -80;

// Endgame
pub const KING_CENTRALIZATION: i32 = 20;
pub const ENDGAME_BONUS: i32 = 50;
/// King centralization applies at or below this many pieces on the board.
pub const KING_CENTRALIZATION_PIECES: u32 = 6;
/// Lead bonus and distance term apply at or below this many pieces.
pub const ENDGAME_PIECES: u32 = 4;

/// Larger than any reachable evaluation.
pub const WIN_SCORE: i32 = 100_000;

use crate::logic::board::PieceKind;

pub const fn get_piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Man => VAL_MAN,
        PieceKind::King => VAL_KING,
    }
}
