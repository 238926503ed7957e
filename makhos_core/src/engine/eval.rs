use crate::engine::config::EngineConfig;
use crate::engine::{Evaluator, Move};
use crate::logic::board::{Board, BoardCoordinate, Piece, PieceKind, Player};
use crate::logic::eval_constants::{ENDGAME_PIECES, KING_CENTRALIZATION_PIECES};
use crate::logic::game::{GameState, GameStatus};
use crate::logic::rules::all_legal_moves;
use std::sync::Arc;

/// Hand-tuned evaluation: material, placement, mobility, threats and an
/// endgame term. Integer arithmetic; half-square distances are doubled and
/// halved once at the end.
pub struct HeuristicEvaluator {
    config: Arc<EngineConfig>,
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(EngineConfig::default()))
    }
}

impl HeuristicEvaluator {
    #[must_use]
    pub const fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    fn material(&self, board: &Board, player: Player) -> i32 {
        let opponent = player.opposite();
        let men = board.count_men(player) as i32 - board.count_men(opponent) as i32;
        let kings = board.count_kings(player) as i32 - board.count_kings(opponent) as i32;
        men * self.config.val_man + kings * self.config.val_king
    }

    fn border_penalty(&self, pos: BoardCoordinate) -> i32 {
        let row_edge = pos.row() == 0 || pos.row() == 7;
        let col_edge = pos.col() == 0 || pos.col() == 7;
        let mut penalty = 0;
        if row_edge {
            penalty += self.config.edge_penalty;
        }
        if col_edge {
            penalty += self.config.edge_penalty;
        }
        if row_edge && col_edge {
            penalty += self.config.corner_penalty;
        }
        penalty
    }

    /// Placement of `player`'s own pieces. Returns `(whole, doubled)` parts.
    fn placement(&self, board: &Board, player: Player) -> (i32, i32) {
        let cfg = &self.config;
        let kings_centralize = board.total_pieces() <= KING_CENTRALIZATION_PIECES;
        let mut whole = 0;
        let mut doubled = 0;

        for piece in board.pieces().filter(|p| p.owner == player) {
            let pos = piece.position;
            let centrality_x2 = 14 - pos.center_distance_x2();
            whole += self.border_penalty(pos);

            match piece.kind {
                PieceKind::Man => {
                    doubled += centrality_x2 * cfg.center_control;
                    let home = player.home_row();
                    if pos.row() == home {
                        whole += cfg.back_row_bonus;
                    }
                    whole += pos.row().abs_diff(home) as i32 * cfg.advancement;
                }
                PieceKind::King => {
                    if kings_centralize {
                        doubled += centrality_x2 * cfg.king_centralization;
                    }
                }
            }
        }
        (whole, doubled)
    }

    /// Bonus for own captures, penalty for each own piece sitting in some
    /// opponent chain (twice for a King).
    fn threats(&self, board: &Board, player: Player, own: &[Move], theirs: &[Move]) -> i32 {
        let cfg = &self.config;
        let mut score = own.iter().filter(|m| m.is_capture()).count() as i32 * cfg.attack_threat;

        let mut attacked: u64 = 0;
        for sq in theirs.iter().flat_map(Move::captured_squares) {
            attacked |= 1u64 << sq.index();
        }
        for piece in board.pieces().filter(|p| p.owner == player) {
            if attacked & (1u64 << piece.position.index()) != 0 {
                score += cfg.piece_under_attack;
                if piece.is_king() {
                    score += cfg.piece_under_attack;
                }
            }
        }
        score
    }

    /// Ahead in a sparse endgame: reward the lead and closing the distance.
    /// Returns `(whole, doubled)` parts.
    fn endgame(&self, board: &Board, player: Player) -> (i32, i32) {
        if board.total_pieces() > ENDGAME_PIECES {
            return (0, 0);
        }
        let lead = board.count_pieces(player) as i32 - board.count_pieces(player.opposite()) as i32;
        if lead <= 0 {
            return (0, 0);
        }

        let (mine, theirs): (Vec<Piece>, Vec<Piece>) =
            board.pieces().partition(|p| p.owner == player);
        let spread: i32 = mine
            .iter()
            .flat_map(|a| theirs.iter().map(move |b| a.position.distance(b.position) as i32))
            .sum();
        (self.config.endgame_bonus * lead, -3 * spread)
    }
}

impl Evaluator for HeuristicEvaluator {
    fn evaluate(&self, state: &GameState, perspective: Player) -> i32 {
        match state.status {
            GameStatus::Win(winner) if winner == perspective => return self.config.win_score,
            GameStatus::Win(_) => return -self.config.win_score,
            GameStatus::Draw => return 0,
            GameStatus::Playing => {}
        }

        let board = &state.board;
        let opponent = perspective.opposite();
        let own_moves = all_legal_moves(board, perspective);
        let their_moves = all_legal_moves(board, opponent);

        let (placement, placement_x2) = self.placement(board, perspective);
        let (endgame, endgame_x2) = self.endgame(board, perspective);

        let mut score = self.material(board, perspective);
        score += placement;
        score += (own_moves.len() as i32 - their_moves.len() as i32) * self.config.mobility;
        score += self.threats(board, perspective, &own_moves, &their_moves);
        score += endgame;
        score += (placement_x2 + endgame_x2) / 2;
        if state.current_player == perspective {
            score += self.config.tempo;
        }
        score
    }
}
