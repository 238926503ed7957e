use crate::logic::board::{PieceKind, Player};
use std::sync::OnceLock;

// 2 kinds * 2 players * 64 squares
const NUM_KINDS: usize = 2;
const NUM_PLAYERS: usize = 2;
const NUM_SQUARES: usize = 64;
const TABLE_SIZE: usize = NUM_KINDS * NUM_PLAYERS * NUM_SQUARES;

pub struct ZobristKeys {
    pub piece_keys: [u64; TABLE_SIZE],
    pub side_key: u64,
}

// XorShift keeps the keys identical across runs and targets.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

static KEYS: OnceLock<ZobristKeys> = OnceLock::new();

impl ZobristKeys {
    fn generate() -> Self {
        let mut rng = XorShift64::new(0x9E37_79B9_7F4A_7C15);
        let mut piece_keys = [0; TABLE_SIZE];
        for key in &mut piece_keys {
            *key = rng.next();
        }
        let side_key = rng.next();

        Self {
            piece_keys,
            side_key,
        }
    }

    pub fn get() -> &'static Self {
        KEYS.get_or_init(Self::generate)
    }

    #[must_use]
    pub fn piece_key(&self, kind: PieceKind, owner: Player, square: usize) -> u64 {
        let kind_idx = match kind {
            PieceKind::Man => 0,
            PieceKind::King => 1,
        };
        let idx = ((kind_idx * NUM_PLAYERS + owner.index()) * NUM_SQUARES) + square;
        self.piece_keys.get(idx).copied().unwrap_or(0)
    }

    /// Key xor-ed into a position signature when Black is to move.
    #[must_use]
    pub const fn side_key_for(&self, turn: Player) -> u64 {
        match turn {
            Player::White => 0,
            Player::Black => self.side_key,
        }
    }
}
