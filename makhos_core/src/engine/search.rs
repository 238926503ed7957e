use crate::engine::config::EngineConfig;
use crate::engine::eval::HeuristicEvaluator;
use crate::engine::move_list::MoveList;
use crate::engine::tt::{score_from_tt, score_to_tt, TTEntry, TTFlag, TranspositionTable};
use crate::engine::{Deadline, Evaluator, Move, SearchLimit, SearchResult, Searcher};
use crate::logic::board::{Board, PieceKind, Player};
use crate::logic::game::{GameState, GameStatus};
use crate::logic::rules::has_capture;
use std::sync::Arc;

const INFINITY: i32 = 1_000_000;
const MAX_PLY: usize = 64;

/// Negamax alpha-beta with iterative deepening, a transposition table,
/// capture-only quiescence and tactical extensions.
pub struct AlphaBetaEngine<E: Evaluator = HeuristicEvaluator> {
    config: Arc<EngineConfig>,
    evaluator: E,
    tt: TranspositionTable,
    killer_moves: [[Option<Move>; 2]; MAX_PLY],
    nodes_searched: u64,
    deadline: Deadline,
}

impl AlphaBetaEngine<HeuristicEvaluator> {
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let evaluator = HeuristicEvaluator::new(Arc::clone(&config));
        Self::with_evaluator(config, evaluator)
    }

    pub fn update_config(&mut self, config: Arc<EngineConfig>) {
        if config.tt_size_mb != self.config.tt_size_mb {
            self.tt = TranspositionTable::new(config.tt_size_mb);
        }
        self.evaluator = HeuristicEvaluator::new(Arc::clone(&config));
        self.config = config;
    }
}

impl<E: Evaluator> AlphaBetaEngine<E> {
    pub fn with_evaluator(config: Arc<EngineConfig>, evaluator: E) -> Self {
        Self {
            tt: TranspositionTable::new(config.tt_size_mb),
            config,
            evaluator,
            killer_moves: [[None; 2]; MAX_PLY],
            nodes_searched: 0,
            deadline: Deadline::start(None),
        }
    }

    #[must_use]
    pub const fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    /// Score of a decided position for the side `turn` that would move
    /// next. Faster wins score higher.
    fn terminal_score(&self, status: GameStatus, turn: Player, ply: u8) -> Option<i32> {
        let mate = self.config.win_score - i32::from(ply);
        match status {
            GameStatus::Playing => None,
            GameStatus::Draw => Some(0),
            GameStatus::Win(winner) if winner == turn => Some(mate),
            GameStatus::Win(_) => Some(-mate),
        }
    }

    // `turn` is passed down because a decided position keeps
    // `current_player` on the side that just moved.
    #[allow(clippy::too_many_arguments)]
    fn alpha_beta(
        &mut self,
        state: &mut GameState,
        mut alpha: i32,
        beta: i32,
        depth: u8,
        turn: Player,
        ply: u8,
        extensions: u8,
    ) -> Option<i32> {
        self.nodes_searched += 1;

        if self.deadline.expired() {
            return None;
        }

        if let Some(score) = self.terminal_score(state.status, turn, ply) {
            return Some(score);
        }

        if depth == 0 {
            return Some(self.quiescence(state, alpha, beta, turn, ply, 0));
        }

        let key = state.signature();
        let tt_entry = self.tt.probe(key).map(|e| TTEntry {
            score: score_from_tt(e.score, ply, self.config.win_score),
            ..e
        });
        if let Some(score) = tt_entry.and_then(|e| e.cutoff(depth, alpha, beta)) {
            return Some(score);
        }

        let tt_move = tt_entry.and_then(|e| e.best_move);
        let moves = self.ordered_moves(state, turn, tt_move, ply);
        if moves.is_empty() {
            return Some(-(self.config.win_score - i32::from(ply)));
        }

        let alpha_orig = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for mv in &moves {
            state.make_move_unchecked(mv);
            let extension = u8::from(
                extensions < self.config.max_extensions && Self::should_extend(state, mv, turn),
            );
            let result = self.alpha_beta(
                state,
                -beta,
                -alpha,
                depth - 1 + extension,
                turn.opposite(),
                ply.saturating_add(1),
                extensions + extension,
            );
            state.undo_move();

            let score = -result?;
            if score > best_score {
                best_score = score;
                best_move = Some(*mv);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                if !mv.is_capture() {
                    self.store_killer(ply, *mv);
                }
                break;
            }
        }

        let flag = if best_score <= alpha_orig {
            TTFlag::UpperBound
        } else if best_score >= beta {
            TTFlag::LowerBound
        } else {
            TTFlag::Exact
        };
        let stored = score_to_tt(best_score, ply, self.config.win_score);
        self.tt.store(key, best_move, stored, depth, flag);

        Some(best_score)
    }

    fn quiescence(
        &mut self,
        state: &mut GameState,
        mut alpha: i32,
        beta: i32,
        turn: Player,
        ply: u8,
        q_depth: u8,
    ) -> i32 {
        self.nodes_searched += 1;

        if let Some(score) = self.terminal_score(state.status, turn, ply) {
            return score;
        }

        let stand_pat = self.evaluator.evaluate(state, turn);
        if q_depth >= self.config.max_quiescence_depth {
            return stand_pat;
        }
        if stand_pat >= beta {
            return beta;
        }
        if alpha < stand_pat {
            alpha = stand_pat;
        }

        if !has_capture(&state.board, turn) {
            return alpha;
        }

        // Mandatory capture: every legal move here is a capture.
        let mut captures: MoveList = state.legal_moves().into_iter().collect();
        for mv in captures.iter_mut() {
            mv.score = self.captured_value(&state.board, mv);
        }
        captures.sort_by_score();

        for mv in &captures {
            // Delta pruning
            if stand_pat + mv.score + self.config.delta_margin < alpha {
                continue;
            }

            state.make_move_unchecked(mv);
            let score = -self.quiescence(
                state,
                -beta,
                -alpha,
                turn.opposite(),
                ply.saturating_add(1),
                q_depth + 1,
            );
            state.undo_move();

            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    /// Called with `mv` already played. Extends captures, forced single
    /// replies, and quiet moves answered only by captures that allow an
    /// immediate recapture.
    fn should_extend(state: &mut GameState, mv: &Move, turn: Player) -> bool {
        if mv.is_capture() {
            return true;
        }
        if state.is_over() {
            return false;
        }

        let replies = state.legal_moves();
        if replies.len() <= 1 {
            return true;
        }
        if !replies.iter().all(Move::is_capture) {
            return false;
        }

        replies.iter().any(|reply| {
            state.make_move_unchecked(reply);
            let recapture = !state.is_over()
                && state.current_player == turn
                && state
                    .legal_moves()
                    .iter()
                    .any(|ours| ours.captured_squares().contains(&reply.to));
            state.undo_move();
            recapture
        })
    }

    fn ordered_moves(
        &self,
        state: &GameState,
        turn: Player,
        tt_move: Option<Move>,
        ply: u8,
    ) -> MoveList {
        let killers = self
            .killer_moves
            .get(usize::from(ply))
            .copied()
            .unwrap_or([None; 2]);

        let mut moves: MoveList = state.legal_moves().into_iter().collect();
        for mv in moves.iter_mut() {
            mv.score = if Some(*mv) == tt_move {
                self.config.score_hash_move
            } else if mv.is_capture() {
                self.config.score_capture_base + self.captured_value(&state.board, mv)
            } else if killers.contains(&Some(*mv)) {
                self.config.score_killer_move
            } else {
                quiet_move_score(&state.board, mv, turn)
            };
        }
        moves.sort_by_score();
        moves
    }

    /// Material removed by a capture chain, at the configured piece values.
    fn captured_value(&self, board: &Board, mv: &Move) -> i32 {
        mv.captured_squares()
            .iter()
            .filter_map(|&sq| board.piece_at(sq))
            .map(|piece| self.config.piece_value(piece.kind))
            .sum()
    }

    fn store_killer(&mut self, ply: u8, mv: Move) {
        // Shift: 0 -> 1, New -> 0
        if let Some(killers) = self.killer_moves.get_mut(usize::from(ply)) {
            if killers[0] != Some(mv) {
                killers[1] = killers[0];
                killers[0] = Some(mv);
            }
        }
    }
}


/// Centre proximity, forward progress, and a bonus for moving a King.
fn quiet_move_score(board: &Board, mv: &Move, turn: Player) -> i32 {
    let centre = (14 - mv.to.center_distance_x2()) * 4;
    let progress = (mv.to.row() as i32 - mv.from.row() as i32) * turn.forward() as i32 * 16;
    let king_bonus = match board.piece_at(mv.from).map(|p| p.kind) {
        Some(PieceKind::King) => 25,
        _ => 0,
    };
    centre + progress + king_bonus
}

impl<E: Evaluator> Searcher for AlphaBetaEngine<E> {
    fn search(&mut self, game_state: &GameState, limit: SearchLimit) -> Option<SearchResult> {
        self.nodes_searched = 0;
        self.deadline = Deadline::start(limit.time_ms);
        self.tt.clear();
        self.killer_moves = [[None; 2]; MAX_PLY];

        let mut state = game_state.clone();
        let turn = state.current_player;
        let root_moves = state.legal_moves();
        let first = *root_moves.first()?;

        if root_moves.len() == 1 {
            return Some(SearchResult {
                best_move: first,
                score: self.evaluator.evaluate(&state, turn),
                nodes: 0,
                time_ms: self.deadline.elapsed_ms() as u64,
                depth: 0,
            });
        }

        let max_depth = limit.depth.unwrap_or(self.config.max_depth).max(1);
        let root_key = state.signature();
        let mut best: Option<(Move, i32)> = None;
        let mut final_depth = 0;

        for depth in 1..=max_depth {
            let mut alpha = -INFINITY;
            let beta = INFINITY;
            let mut iteration_best: Option<(Move, i32)> = None;
            let mut timed_out = false;

            let moves = self.ordered_moves(&state, turn, best.map(|(mv, _)| mv), 0);
            for mv in &moves {
                state.make_move_unchecked(mv);
                let extension = u8::from(
                    self.config.max_extensions > 0 && Self::should_extend(&mut state, mv, turn),
                );
                let result = self.alpha_beta(
                    &mut state,
                    -beta,
                    -alpha,
                    depth - 1 + extension,
                    turn.opposite(),
                    1,
                    extension,
                );
                state.undo_move();

                let Some(value) = result else {
                    timed_out = true;
                    break;
                };
                let score = -value;
                match iteration_best {
                    Some((_, top)) if score <= top => {}
                    _ => iteration_best = Some((*mv, score)),
                }
                alpha = alpha.max(score);
            }

            if timed_out {
                // Keep the last completed depth; a partial result only
                // stands in when nothing completed.
                if best.is_none() && iteration_best.is_some() {
                    best = iteration_best;
                    final_depth = depth;
                }
                log::debug!("depth {depth} interrupted after {} nodes", self.nodes_searched);
                break;
            }

            if let Some((mv, score)) = iteration_best {
                best = Some((mv, score));
                final_depth = depth;
                self.tt.store(root_key, Some(mv), score, depth, TTFlag::Exact);
                log::debug!(
                    "depth {depth}: best {mv} score {score} nodes {} time {:.0}ms",
                    self.nodes_searched,
                    self.deadline.elapsed_ms()
                );
            }

            if self.deadline.expired() {
                break;
            }
        }

        let (best_move, score) =
            best.unwrap_or_else(|| (first, self.evaluator.evaluate(&state, turn)));
        let time_ms = self.deadline.elapsed_ms() as u64;
        log::debug!(
            "search done: {best_move} score {score} depth {final_depth} nodes {} in {time_ms}ms",
            self.nodes_searched
        );

        Some(SearchResult {
            best_move,
            score,
            nodes: self.nodes_searched,
            time_ms,
            depth: final_depth,
        })
    }
}
