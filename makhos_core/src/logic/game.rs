use crate::engine::zobrist::ZobristKeys;
use crate::engine::Move;
use crate::logic::board::{Board, BoardCoordinate, Piece, PieceKind, Player};
use crate::logic::rules::{all_legal_moves, find_move, validate_move, MoveError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Playing,
    Win(Player),
    Draw,
}

/// Thresholds for the three draw rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawRules {
    /// Consecutive plies without a capture before the game is drawn.
    pub no_capture_limit: u32,
    /// Occurrences of the same position (same side to move) that draw.
    pub repetition_limit: u32,
    /// Draw when only Kings remain and at most this many pieces are left.
    /// `None` disables the rule.
    pub insufficient_material_pieces: Option<u32>,
}

impl Default for DrawRules {
    fn default() -> Self {
        Self {
            no_capture_limit: 80,
            repetition_limit: 3,
            insufficient_material_pieces: Some(3),
        }
    }
}

/// Everything needed to take one move back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub mv: Move,
    /// The moving piece as it stood before the move (pre-promotion).
    pub piece: Piece,
    pub captured: Vec<Piece>,
    pub mover: Player,
    pub prev_moves_since_capture: u32,
    pub prev_status: GameStatus,
    /// Signature entered into the repetition table by this move.
    pub signature: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub current_player: Player,
    pub status: GameStatus,
    pub history: Vec<MoveRecord>,
    pub moves_since_capture: u32,
    pub rules: DrawRules,
    repetitions: HashMap<u64, u32>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(DrawRules::default())
    }

    #[must_use]
    pub fn with_rules(rules: DrawRules) -> Self {
        let mut state = Self::from_board(Board::new(), Player::White);
        state.rules = rules;
        state
    }

    /// Starts a game from an arbitrary position. The repetition table holds
    /// only this position. A side without pieces or moves has already lost.
    #[must_use]
    pub fn from_board(board: Board, turn: Player) -> Self {
        let stuck = board.count_pieces(turn) == 0 || all_legal_moves(&board, turn).is_empty();
        let status = if stuck {
            GameStatus::Win(turn.opposite())
        } else {
            GameStatus::Playing
        };

        let mut state = Self {
            board,
            current_player: turn,
            status,
            history: Vec::new(),
            moves_since_capture: 0,
            rules: DrawRules::default(),
            repetitions: HashMap::new(),
        };
        state.repetitions.insert(state.signature(), 1);
        state
    }

    /// Board hash combined with the side to move. Once decided, the side
    /// that would have moved next.
    #[must_use]
    pub fn signature(&self) -> u64 {
        if self.is_over() {
            if let Some(record) = self.history.last() {
                return record.signature;
            }
        }
        self.board.zobrist_hash ^ ZobristKeys::get().side_key_for(self.current_player)
    }

    /// Occurrences of the current position, this one included.
    #[must_use]
    pub fn repetition_count(&self) -> u32 {
        self.repetitions.get(&self.signature()).copied().unwrap_or(0)
    }

    /// Legal moves for the side to move; empty once the game is over.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.is_over() {
            return Vec::new();
        }
        all_legal_moves(&self.board, self.current_player)
    }

    #[must_use]
    pub fn last_move(&self) -> Option<&Move> {
        self.history.last().map(|record| &record.mv)
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.status != GameStatus::Playing
    }

    #[must_use]
    pub const fn winner(&self) -> Option<Player> {
        match self.status {
            GameStatus::Win(player) => Some(player),
            GameStatus::Playing | GameStatus::Draw => None,
        }
    }

    /// Validates and plays `mv` for the side to move. Nothing changes on
    /// error.
    pub fn apply_move(&mut self, mv: &Move) -> Result<MoveRecord, MoveError> {
        if self.is_over() {
            log::trace!("rejected {mv}: game is over ({:?})", self.status);
            return Err(MoveError::GameAlreadyEnded);
        }
        let legal = validate_move(&self.board, mv, self.current_player).inspect_err(|err| {
            log::trace!("rejected {mv} for {:?}: {err}", self.current_player);
        })?;
        Ok(self.make_move_unchecked(&legal))
    }

    /// Plays the legal move joining `from` and `to`, as picked on a board.
    pub fn play(
        &mut self,
        from: BoardCoordinate,
        to: BoardCoordinate,
    ) -> Result<MoveRecord, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameAlreadyEnded);
        }
        let mv = find_move(&self.board, from, to, self.current_player).inspect_err(|err| {
            log::trace!("rejected {from}-{to} for {:?}: {err}", self.current_player);
        })?;
        Ok(self.make_move_unchecked(&mv))
    }

    /// Plays a move already known to be legal. Searchers call this with
    /// moves taken from [`GameState::legal_moves`].
    pub(crate) fn make_move_unchecked(&mut self, mv: &Move) -> MoveRecord {
        let mover = self.current_player;
        let prev_status = self.status;
        let prev_moves_since_capture = self.moves_since_capture;

        let piece = self.board.remove(mv.from).unwrap_or(Piece::man(mover, mv.from));
        let captured: Vec<Piece> = mv
            .captured_squares()
            .iter()
            .filter_map(|&sq| self.board.remove(sq))
            .collect();
        self.board.place(mv.to, piece);
        if matches!(piece.kind, PieceKind::Man) && mv.to.row() == mover.promotion_row() {
            self.board.promote(mv.to);
        }

        self.moves_since_capture = if captured.is_empty() {
            self.moves_since_capture + 1
        } else {
            0
        };

        let next = mover.opposite();
        let signature = self.board.zobrist_hash ^ ZobristKeys::get().side_key_for(next);
        let occurrences = self.repetitions.entry(signature).or_insert(0);
        *occurrences += 1;
        let occurrences = *occurrences;

        self.status = self.end_of_turn_status(mover, occurrences);
        if self.status == GameStatus::Playing {
            self.current_player = next;
        }

        let record = MoveRecord {
            mv: *mv,
            piece,
            captured,
            mover,
            prev_moves_since_capture,
            prev_status,
            signature,
        };
        self.history.push(record.clone());
        record
    }

    fn end_of_turn_status(&self, mover: Player, occurrences: u32) -> GameStatus {
        let next = mover.opposite();

        if self.board.count_pieces(next) == 0 {
            return GameStatus::Win(mover);
        }
        if self.board.count_pieces(mover) == 0 {
            return GameStatus::Win(next);
        }
        if all_legal_moves(&self.board, next).is_empty() {
            return GameStatus::Win(mover);
        }
        if self.moves_since_capture >= self.rules.no_capture_limit {
            return GameStatus::Draw;
        }
        if occurrences >= self.rules.repetition_limit {
            return GameStatus::Draw;
        }
        if let Some(limit) = self.rules.insufficient_material_pieces {
            let only_kings = self.board.count_men(Player::White) == 0
                && self.board.count_men(Player::Black) == 0;
            if only_kings && self.board.total_pieces() <= limit {
                return GameStatus::Draw;
            }
        }
        GameStatus::Playing
    }

    /// Takes back the last move exactly. Returns `None` with an empty
    /// history.
    pub fn undo_move(&mut self) -> Option<MoveRecord> {
        let record = self.history.pop()?;

        self.board.remove(record.mv.to);
        for piece in &record.captured {
            self.board.place(piece.position, *piece);
        }
        self.board.place(record.mv.from, record.piece);

        if let Some(count) = self.repetitions.get_mut(&record.signature) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.repetitions.remove(&record.signature);
            }
        }

        self.moves_since_capture = record.prev_moves_since_capture;
        self.status = record.prev_status;
        self.current_player = record.mover;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: usize, col: usize) -> BoardCoordinate {
        BoardCoordinate::new(row, col).unwrap()
    }

    fn board_with(pieces: &[(usize, usize, Player, PieceKind)]) -> Board {
        let mut board = Board::empty();
        for &(r, c, owner, kind) in pieces {
            let pos = sq(r, c);
            assert!(board.place(
                pos,
                Piece {
                    owner,
                    kind,
                    position: pos
                }
            ));
        }
        board
    }

    #[test]
    fn test_new_game() {
        let game = GameState::new();
        assert_eq!(game.current_player, Player::White);
        assert_eq!(game.status, GameStatus::Playing);
        assert_eq!(game.repetition_count(), 1);
        assert_eq!(game.legal_moves().len(), 7);
        assert!(game.last_move().is_none());
        assert!(!game.is_over());
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn test_play_switches_turn_and_records_history() {
        let mut game = GameState::new();
        let record = game.play(sq(1, 2), sq(2, 3)).unwrap();
        assert_eq!(record.mover, Player::White);
        assert!(record.captured.is_empty());
        assert_eq!(game.current_player, Player::Black);
        assert_eq!(game.moves_since_capture, 1);
        assert_eq!(game.history.len(), 1);
        assert_eq!(game.last_move(), Some(&record.mv));
    }

    #[test]
    fn test_illegal_move_leaves_state_untouched() {
        let mut game = GameState::new();
        let before = game.signature();
        assert_eq!(
            game.play(sq(6, 1), sq(5, 0)),
            Err(MoveError::NotMoversPiece)
        );
        assert_eq!(
            game.play(sq(1, 2), sq(3, 4)),
            Err(MoveError::IllegalDestination)
        );
        assert_eq!(game.signature(), before);
        assert!(game.history.is_empty());
        assert_eq!(game.current_player, Player::White);
    }

    #[test]
    fn test_capture_resets_counter_and_removes_piece() {
        let board = board_with(&[
            (2, 1, Player::White, PieceKind::Man),
            (3, 2, Player::Black, PieceKind::Man),
            (6, 5, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        game.moves_since_capture = 10;

        let record = game.play(sq(2, 1), sq(4, 3)).unwrap();
        assert_eq!(record.captured.len(), 1);
        assert_eq!(game.moves_since_capture, 0);
        assert_eq!(game.board.count_pieces(Player::Black), 1);
        assert!(game.board.piece_at(sq(3, 2)).is_none());
    }

    #[test]
    fn test_promotion_and_undo() {
        let board = board_with(&[
            (6, 1, Player::White, PieceKind::Man),
            (1, 6, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        let before = game.signature();

        game.play(sq(6, 1), sq(7, 2)).unwrap();
        assert!(game.board.piece_at(sq(7, 2)).unwrap().is_king());

        let record = game.undo_move().unwrap();
        assert_eq!(record.piece.kind, PieceKind::Man);
        assert_eq!(game.signature(), before);
        assert_eq!(game.board.piece_at(sq(6, 1)).unwrap().kind, PieceKind::Man);
        assert_eq!(game.current_player, Player::White);
        assert_eq!(game.repetition_count(), 1);
        assert!(game.undo_move().is_none());
    }

    #[test]
    fn test_last_piece_captured_wins() {
        let board = board_with(&[
            (2, 1, Player::White, PieceKind::Man),
            (3, 2, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        game.play(sq(2, 1), sq(4, 3)).unwrap();
        assert_eq!(game.status, GameStatus::Win(Player::White));
        assert_eq!(game.winner(), Some(Player::White));
        // The mover stays current once the game is decided.
        assert_eq!(game.current_player, Player::White);
        assert!(game.legal_moves().is_empty());
        // The final position is keyed with the loser to move, as recorded.
        let keys = ZobristKeys::get();
        assert_eq!(
            game.signature(),
            game.board.zobrist_hash ^ keys.side_key_for(Player::Black)
        );
        assert_eq!(game.repetition_count(), 1);
        assert_eq!(
            game.play(sq(4, 3), sq(5, 4)),
            Err(MoveError::GameAlreadyEnded)
        );

        game.undo_move().unwrap();
        assert_eq!(game.status, GameStatus::Playing);
        assert_eq!(game.board.count_pieces(Player::Black), 1);
    }

    #[test]
    fn test_blocked_side_loses() {
        // Black's man on (2,1) has both forward squares filled and both
        // landing squares blocked or off the board.
        let board = board_with(&[
            (1, 0, Player::White, PieceKind::Man),
            (1, 2, Player::White, PieceKind::Man),
            (0, 3, Player::White, PieceKind::Man),
            (3, 0, Player::White, PieceKind::Man),
            (3, 2, Player::White, PieceKind::Man),
            (2, 1, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        assert_eq!(game.status, GameStatus::Playing);
        game.play(sq(3, 2), sq(4, 3)).unwrap();
        assert_eq!(game.status, GameStatus::Win(Player::White));
    }

    #[test]
    fn test_from_board_without_moves_is_decided() {
        let board = board_with(&[
            (7, 0, Player::White, PieceKind::Man),
            (0, 1, Player::Black, PieceKind::Man),
        ]);
        let game = GameState::from_board(board, Player::White);
        assert_eq!(game.status, GameStatus::Win(Player::Black));
    }

    #[test]
    fn test_no_capture_limit_draws() {
        let board = board_with(&[
            (0, 1, Player::White, PieceKind::King),
            (1, 0, Player::White, PieceKind::Man),
            (7, 0, Player::Black, PieceKind::King),
            (6, 7, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        game.rules.no_capture_limit = 2;

        game.play(sq(0, 1), sq(1, 2)).unwrap();
        assert_eq!(game.status, GameStatus::Playing);
        game.play(sq(7, 0), sq(6, 1)).unwrap();
        assert_eq!(game.status, GameStatus::Draw);
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn test_insufficient_material_draws() {
        let board = board_with(&[
            (0, 1, Player::White, PieceKind::King),
            (7, 0, Player::Black, PieceKind::King),
            (7, 6, Player::Black, PieceKind::King),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        game.play(sq(0, 1), sq(1, 0)).unwrap();
        assert_eq!(game.status, GameStatus::Draw);

        let board = board_with(&[
            (0, 1, Player::White, PieceKind::King),
            (7, 0, Player::Black, PieceKind::King),
            (7, 6, Player::Black, PieceKind::King),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        game.rules.insufficient_material_pieces = None;
        game.play(sq(0, 1), sq(1, 0)).unwrap();
        assert_eq!(game.status, GameStatus::Playing);
    }

    #[test]
    fn test_apply_move_canonicalises_promotion_flag() {
        let board = board_with(&[
            (6, 1, Player::White, PieceKind::Man),
            (1, 6, Player::Black, PieceKind::Man),
        ]);
        let mut game = GameState::from_board(board, Player::White);
        let record = game
            .apply_move(&Move::step(sq(6, 1), sq(7, 0), false))
            .unwrap();
        assert!(record.mv.promotes);
        assert!(game.board.piece_at(sq(7, 0)).unwrap().is_king());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut game = GameState::new();
        let snapshot = game.clone();
        game.play(sq(1, 2), sq(2, 3)).unwrap();
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.repetition_count(), 1);
        assert_ne!(snapshot.signature(), game.signature());
    }

    #[test]
    fn test_draw_rules_deserialize_partial() {
        let rules: DrawRules = serde_json::from_str(r#"{"repetition_limit": 5}"#).unwrap();
        assert_eq!(rules.repetition_limit, 5);
        assert_eq!(rules.no_capture_limit, 80);
        assert_eq!(rules.insufficient_material_pieces, Some(3));
    }
}
