use crate::engine::config::MctsConfig;
use crate::engine::eval::HeuristicEvaluator;
use crate::engine::{Deadline, Evaluator, Move, SearchLimit, SearchResult, Searcher};
use crate::logic::board::{Board, Player};
use crate::logic::eval_constants::get_piece_value;
use crate::logic::game::{GameState, GameStatus};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
struct Node {
    state: GameState,
    mv: Option<Move>,
    /// Side that played `mv`. For the root, the side that moved last.
    mover: Player,
    parent: Option<usize>,
    children: Vec<usize>,
    visits: u32,
    /// Accumulated results from `mover`'s point of view.
    wins: f64,
    untried: Vec<Move>,
}

impl Node {
    fn new(
        state: GameState,
        mv: Option<Move>,
        mover: Player,
        parent: Option<usize>,
        rng: &mut impl Rng,
    ) -> Self {
        let mut untried = state.legal_moves();
        untried.shuffle(rng);
        Self {
            state,
            mv,
            mover,
            parent,
            children: Vec::new(),
            visits: 0,
            wins: 0.0,
            untried,
        }
    }

    fn ucb1(&self, parent_visits: u32, exploration: f64) -> f64 {
        if self.visits == 0 {
            return f64::INFINITY;
        }
        let visits = f64::from(self.visits);
        exploration.mul_add(
            (f64::from(parent_visits).ln() / visits).sqrt(),
            self.wins / visits,
        )
    }
}

/// Material removed by a capture chain, at the default piece values.
fn material_taken(board: &Board, mv: &Move) -> i32 {
    mv.captured_squares()
        .iter()
        .filter_map(|&sq| board.piece_at(sq))
        .map(|piece| get_piece_value(piece.kind))
        .sum()
}

/// Monte Carlo Tree Search over an index arena. Selection uses UCB1,
/// playouts are guided for their first plies and random afterwards, and
/// playouts that hit the ply cap are scored by the evaluator.
///
/// The tree lives only for one `search` call; the root statistics are kept
/// for [`MctsEngine::root_children`].
pub struct MctsEngine<E: Evaluator = HeuristicEvaluator> {
    config: MctsConfig,
    evaluator: E,
    arena: Vec<Node>,
    root_stats: Vec<(Move, u32, f64)>,
}

impl MctsEngine {
    #[must_use]
    pub fn new(config: MctsConfig) -> Self {
        Self::with_evaluator(config, HeuristicEvaluator::default())
    }
}

impl<E: Evaluator> MctsEngine<E> {
    #[must_use]
    pub const fn with_evaluator(config: MctsConfig, evaluator: E) -> Self {
        Self {
            config,
            evaluator,
            arena: Vec::new(),
            root_stats: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MctsConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: MctsConfig) {
        self.config = config;
    }

    /// Root children of the last search as `(move, visits, wins)`, where
    /// `wins` is from the point of view of the side to move at the root.
    #[must_use]
    pub fn root_children(&self) -> Vec<(Move, u32, f64)> {
        self.root_stats.clone()
    }

    fn collect_root_stats(&self) -> Vec<(Move, u32, f64)> {
        let Some(root) = self.arena.first() else {
            return Vec::new();
        };
        root.children
            .iter()
            .filter_map(|&idx| self.arena.get(idx))
            .filter_map(|child| child.mv.map(|mv| (mv, child.visits, child.wins)))
            .collect()
    }

    fn make_rng(&self) -> StdRng {
        self.config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    fn run_iteration(&mut self, rng: &mut StdRng) {
        let mut idx = 0;
        while let Some(node) = self.arena.get(idx) {
            if !node.untried.is_empty() {
                break;
            }
            match self.select_child(node) {
                Some(child) => idx = child,
                None => break,
            }
        }

        let expansion = self
            .arena
            .get_mut(idx)
            .and_then(|node| node.untried.pop().map(|mv| (mv, node.state.clone())));
        if let Some((mv, mut state)) = expansion {
            let mover = state.current_player;
            state.make_move_unchecked(&mv);
            let child_idx = self.arena.len();
            self.arena.push(Node::new(state, Some(mv), mover, Some(idx), rng));
            if let Some(parent) = self.arena.get_mut(idx) {
                parent.children.push(child_idx);
            }
            idx = child_idx;
        }

        let Some(leaf) = self.arena.get(idx) else {
            return;
        };
        let result = self.rollout(leaf.state.clone(), leaf.mover, rng);
        self.backpropagate(idx, result);
    }

    /// Child of `node` with the highest UCB1 value; the first one on ties.
    fn select_child(&self, node: &Node) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &idx in &node.children {
            let Some(child) = self.arena.get(idx) else {
                continue;
            };
            let score = child.ucb1(node.visits, self.config.exploration_constant);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Plays `state` out and returns the result for `perspective`:
    /// 1 for a win, 0 for a loss, 0.5 for a draw, or the squashed
    /// evaluation when the ply cap is reached first.
    fn rollout(&self, mut state: GameState, perspective: Player, rng: &mut StdRng) -> f64 {
        for ply in 0..self.config.rollout_move_cap {
            if state.is_over() {
                break;
            }
            let moves = state.legal_moves();
            let choice = if ply < self.config.guided_rollout_plies {
                self.guided_choice(&state, &moves, rng)
            } else {
                moves.choose(rng).copied()
            };
            let Some(mv) = choice else {
                break;
            };
            state.make_move_unchecked(&mv);
        }

        match state.status {
            GameStatus::Win(winner) if winner == perspective => 1.0,
            GameStatus::Win(_) => 0.0,
            GameStatus::Draw => 0.5,
            GameStatus::Playing => self.squash(self.evaluator.evaluate(&state, perspective)),
        }
    }

    /// Heaviest capture when captures are forced, otherwise the best of a
    /// random sample by one-ply evaluation.
    fn guided_choice(&self, state: &GameState, moves: &[Move], rng: &mut StdRng) -> Option<Move> {
        if moves.first().is_some_and(Move::is_capture) {
            return moves
                .iter()
                .max_by_key(|mv| material_taken(&state.board, mv))
                .copied();
        }

        let mover = state.current_player;
        moves
            .choose_multiple(rng, self.config.rollout_sample_size.max(1))
            .max_by_key(|mv| {
                let mut next = state.clone();
                next.make_move_unchecked(mv);
                self.evaluator.evaluate(&next, mover)
            })
            .copied()
    }

    fn squash(&self, score: i32) -> f64 {
        1.0 / (1.0 + (-f64::from(score) / self.config.eval_scale).exp())
    }

    /// Inverse of [`Self::squash`], clamped away from certainty.
    fn win_rate_to_score(&self, rate: f64) -> i32 {
        let p = rate.clamp(0.001, 0.999);
        (self.config.eval_scale * (p / (1.0 - p)).ln()).round() as i32
    }

    fn backpropagate(&mut self, idx: usize, mut result: f64) {
        let mut cursor = Some(idx);
        while let Some(node) = cursor.and_then(|i| self.arena.get_mut(i)) {
            node.visits += 1;
            node.wins += result;
            cursor = node.parent;
            result = 1.0 - result;
        }
    }
}

impl<E: Evaluator> Searcher for MctsEngine<E> {
    fn search(&mut self, game_state: &GameState, limit: SearchLimit) -> Option<SearchResult> {
        let deadline = Deadline::start(limit.time_ms.or(self.config.time_limit_ms));
        let iterations = limit.iterations.unwrap_or(self.config.iterations);
        let mut rng = self.make_rng();

        self.arena.clear();
        self.root_stats.clear();
        let root = Node::new(
            game_state.clone(),
            None,
            game_state.current_player.opposite(),
            None,
            &mut rng,
        );
        let fallback = root.untried.first().copied()?;
        self.arena.push(root);

        let mut completed = 0u32;
        while completed < iterations && !deadline.expired() {
            self.run_iteration(&mut rng);
            completed += 1;
        }

        let tree_size = self.arena.len();
        self.root_stats = self.collect_root_stats();
        self.arena = Vec::new();

        let (best_move, score) = self
            .root_stats
            .iter()
            .max_by_key(|&&(_, visits, _)| visits)
            .map_or((fallback, 0), |&(mv, visits, wins)| {
                (mv, self.win_rate_to_score(wins / f64::from(visits.max(1))))
            });

        for (mv, visits, wins) in &self.root_stats {
            log::trace!("mcts root child {mv}: {visits} visits, {wins:.1} wins");
        }
        let time_ms = deadline.elapsed_ms() as u64;
        log::debug!(
            "mcts done: {best_move} score {score} after {completed} iterations, {tree_size} nodes in {time_ms}ms"
        );

        Some(SearchResult {
            best_move,
            score,
            nodes: u64::from(completed),
            time_ms,
            depth: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::board::{Board, BoardCoordinate, Piece, PieceKind};

    fn sq(row: usize, col: usize) -> BoardCoordinate {
        BoardCoordinate::new(row, col).unwrap()
    }

    fn state(pieces: &[(usize, usize, Player, PieceKind)], turn: Player) -> GameState {
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
        GameState::from_board(board, turn)
    }

    fn seeded(iterations: u32, seed: u64) -> MctsEngine {
        MctsEngine::new(MctsConfig {
            iterations,
            seed: Some(seed),
            ..MctsConfig::default()
        })
    }

    #[test]
    fn test_root_visits_sum_to_iterations() {
        let mut engine = seeded(200, 1);
        let result = engine
            .search(&GameState::new(), SearchLimit::default())
            .unwrap();
        assert_eq!(result.nodes, 200);

        let children = engine.root_children();
        assert_eq!(children.len(), 7);
        let total: u32 = children.iter().map(|&(_, visits, _)| visits).sum();
        assert_eq!(total, 200);
        for (_, visits, wins) in children {
            assert!(wins >= 0.0);
            assert!(wins <= f64::from(visits));
        }
    }

    #[test]
    fn test_tree_is_released_after_search() {
        let mut engine = seeded(300, 8);
        engine
            .search(&GameState::new(), SearchLimit::default())
            .unwrap();
        assert!(engine.arena.is_empty());
        assert_eq!(engine.arena.capacity(), 0);
        assert_eq!(engine.root_children().len(), 7);

        // A second search starts from a fresh tree.
        let result = engine
            .search(&GameState::new(), SearchLimit::iterations(25))
            .unwrap();
        assert_eq!(result.nodes, 25);
        let total: u32 = engine.root_children().iter().map(|&(_, v, _)| v).sum();
        assert_eq!(total, 25);
        assert!(engine.arena.is_empty());
    }

    #[test]
    fn test_limit_overrides_configured_iterations() {
        let mut engine = seeded(500, 2);
        let result = engine
            .search(&GameState::new(), SearchLimit::iterations(40))
            .unwrap();
        assert_eq!(result.nodes, 40);
    }

    #[test]
    fn test_takes_winning_chain() {
        let game = state(
            &[
                (2, 1, Player::White, PieceKind::Man),
                (2, 3, Player::White, PieceKind::Man),
                (3, 2, Player::Black, PieceKind::Man),
                (5, 4, Player::Black, PieceKind::Man),
            ],
            Player::White,
        );
        let mut engine = seeded(300, 3);
        let result = engine.search(&game, SearchLimit::default()).unwrap();
        assert_eq!(result.best_move.from, sq(2, 1));
        assert_eq!(result.best_move.to, sq(6, 5));
        assert!(result.score > 0);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let mut a = seeded(150, 42);
        let mut b = seeded(150, 42);
        let game = GameState::new();
        let ra = a.search(&game, SearchLimit::default()).unwrap();
        let rb = b.search(&game, SearchLimit::default()).unwrap();
        assert_eq!(ra.best_move, rb.best_move);
        assert_eq!(a.root_children(), b.root_children());
    }

    #[test]
    fn test_no_moves_returns_none() {
        let game = state(&[(7, 0, Player::Black, PieceKind::Man)], Player::White);
        let mut engine = seeded(10, 4);
        assert!(engine.search(&game, SearchLimit::default()).is_none());
        assert!(engine.root_children().is_empty());
    }

    #[test]
    fn test_zero_iterations_falls_back_to_a_legal_move() {
        let game = GameState::new();
        let mut engine = seeded(0, 5);
        let result = engine.search(&game, SearchLimit::default()).unwrap();
        assert!(game.legal_moves().contains(&result.best_move));
        assert_eq!(result.nodes, 0);
    }

    #[test]
    fn test_search_leaves_caller_state_untouched() {
        let game = GameState::new();
        let before = game.signature();
        let mut engine = seeded(50, 6);
        engine.search(&game, SearchLimit::default()).unwrap();
        assert_eq!(game.signature(), before);
        assert!(game.history.is_empty());
    }

    #[test]
    fn test_squash_is_symmetric() {
        let engine = seeded(1, 7);
        assert!((engine.squash(0) - 0.5).abs() < 1e-12);
        assert!((engine.squash(400) + engine.squash(-400) - 1.0).abs() < 1e-12);
        assert_eq!(engine.win_rate_to_score(0.5), 0);
    }
}
