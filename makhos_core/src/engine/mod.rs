use crate::logic::board::{BoardCoordinate, Player};
use crate::logic::game::GameState;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod eval;
pub mod mcts;
pub mod move_list;
pub mod search;
pub mod tt;
pub mod zobrist;


/// Longest chain a single move can record. A side never has more than
/// twelve pieces on the 32 dark squares, so this is never reached in play.
pub const MAX_CHAIN: usize = 16;

/// Ordered list of squares captured along one chain, stored inline so that
/// `Move` stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureChain {
    squares: [BoardCoordinate; MAX_CHAIN],
    len: u8,
}

impl CaptureChain {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            squares: [BoardCoordinate::ORIGIN; MAX_CHAIN],
            len: 0,
        }
    }

    /// Appends a captured square. Returns false once the chain is full.
    pub fn push(&mut self, sq: BoardCoordinate) -> bool {
        match self.squares.get_mut(self.len as usize) {
            Some(slot) => {
                *slot = sq;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[BoardCoordinate] {
        self.squares.get(..self.len as usize).unwrap_or(&[])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn contains(&self, sq: BoardCoordinate) -> bool {
        self.as_slice().contains(&sq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveKind {
    #[default]
    Step,
    Capture(CaptureChain),
}

/// A complete turn for one piece: a single step, or a whole capture chain.
///
/// `score` is scratch space for move ordering and takes no part in equality.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Move {
    pub from: BoardCoordinate,
    pub to: BoardCoordinate,
    pub kind: MoveKind,
    pub promotes: bool,
    pub score: i32,
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.kind == other.kind
            && self.promotes == other.promotes
    }
}

impl Eq for Move {}

impl Move {
    #[must_use]
    pub const fn step(from: BoardCoordinate, to: BoardCoordinate, promotes: bool) -> Self {
        Self {
            from,
            to,
            kind: MoveKind::Step,
            promotes,
            score: 0,
        }
    }

    #[must_use]
    pub const fn capture(
        from: BoardCoordinate,
        to: BoardCoordinate,
        chain: CaptureChain,
        promotes: bool,
    ) -> Self {
        Self {
            from,
            to,
            kind: MoveKind::Capture(chain),
            promotes,
            score: 0,
        }
    }

    #[must_use]
    pub const fn is_capture(&self) -> bool {
        matches!(self.kind, MoveKind::Capture(_))
    }

    /// Squares vacated by captured pieces, in jump order. Empty for steps.
    #[must_use]
    pub fn captured_squares(&self) -> &[BoardCoordinate] {
        match &self.kind {
            MoveKind::Step => &[],
            MoveKind::Capture(chain) => chain.as_slice(),
        }
    }

    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.captured_squares().len()
    }

    /// Same squares travelled and captured; ignores the promotion flag and
    /// ordering score.
    #[must_use]
    pub fn same_path(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.captured_squares() == other.captured_squares()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MoveKind::Step => write!(f, "{}-{}", self.from, self.to)?,
            MoveKind::Capture(chain) => {
                write!(f, "{}", self.from)?;
                for sq in chain.as_slice() {
                    write!(f, "x{sq}")?;
                }
                write!(f, ":{}", self.to)?;
            }
        }
        if self.promotes {
            write!(f, "=K")?;
        }
        Ok(())
    }
}

/// Budget for one search call. Unset fields fall back to the searcher's
/// configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimit {
    pub depth: Option<u8>,
    pub time_ms: Option<u64>,
    pub iterations: Option<u32>,
}

impl SearchLimit {
    #[must_use]
    pub const fn depth(depth: u8) -> Self {
        Self {
            depth: Some(depth),
            time_ms: None,
            iterations: None,
        }
    }

    #[must_use]
    pub const fn time(ms: u64) -> Self {
        Self {
            depth: None,
            time_ms: Some(ms),
            iterations: None,
        }
    }

    #[must_use]
    pub const fn iterations(iterations: u32) -> Self {
        Self {
            depth: None,
            time_ms: None,
            iterations: Some(iterations),
        }
    }

    #[must_use]
    pub const fn with_time(mut self, ms: u64) -> Self {
        self.time_ms = Some(ms);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_move: Move,
    /// Score from the point of view of the side to move at the root.
    pub score: i32,
    pub nodes: u64,
    pub time_ms: u64,
    /// Deepest completed iteration (alpha-beta) or 0 for MCTS.
    pub depth: u8,
}

/// Static evaluation seam. The heuristic evaluator implements it; a learned
/// model can be dropped in behind the same signature.
pub trait Evaluator {
    /// Score `state` from `perspective`'s point of view. Must be
    /// deterministic: the transposition table relies on it.
    fn evaluate(&self, state: &GameState, perspective: Player) -> i32;
}

pub trait Searcher {
    /// Returns `None` when the side to move has no legal move.
    fn search(&mut self, game_state: &GameState, limit: SearchLimit) -> Option<SearchResult>;
}

/// Wall clock in milliseconds. Uses `performance.now()` inside a browser or
/// worker and the system clock elsewhere.
pub(crate) fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen::JsCast;
        if let Some(window) = web_sys::window() {
            return window.performance().map_or(0.0, |p| p.now());
        }
        let global = js_sys::global();
        if let Ok(worker) = global.dyn_into::<web_sys::WorkerGlobalScope>() {
            return worker.performance().map_or(0.0, |p| p.now());
        }
        0.0
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        let since_the_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (since_the_epoch.as_secs() as f64).mul_add(
            1000.0,
            f64::from(since_the_epoch.subsec_nanos()) / 1_000_000.0,
        )
    }
}

/// Start time plus optional budget, checked cooperatively by the searchers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    start: f64,
    limit: Option<f64>,
}

impl Deadline {
    pub(crate) fn start(limit_ms: Option<u64>) -> Self {
        Self {
            start: now_ms(),
            limit: limit_ms.map(|ms| ms as f64),
        }
    }

    pub(crate) fn elapsed_ms(&self) -> f64 {
        (now_ms() - self.start).max(0.0)
    }

    pub(crate) fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.elapsed_ms() > limit)
    }
}
