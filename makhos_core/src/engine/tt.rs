use crate::engine::Move;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TTFlag {
    Exact,
    LowerBound, // Beta cutoff (fail-high)
    UpperBound, // Alpha cutoff (fail-low)
}

#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    pub key: u64,
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: u8,
    pub flag: TTFlag,
}

impl Default for TTEntry {
    fn default() -> Self {
        Self {
            key: 0,
            best_move: None,
            score: 0,
            depth: 0,
            flag: TTFlag::Exact,
        }
    }
}

impl TTEntry {
    /// Score usable at `depth` inside the `(alpha, beta)` window, if any.
    #[must_use]
    pub const fn cutoff(&self, depth: u8, alpha: i32, beta: i32) -> Option<i32> {
        if self.depth < depth {
            return None;
        }
        match self.flag {
            TTFlag::Exact => Some(self.score),
            TTFlag::LowerBound if self.score >= beta => Some(self.score),
            TTFlag::UpperBound if self.score <= alpha => Some(self.score),
            TTFlag::LowerBound | TTFlag::UpperBound => None,
        }
    }
}

/// Scores within this many plies of `win_score` are decided results.
const WIN_WINDOW: i32 = 256;

/// Win scores count plies from the root; the table stores them counted from
/// the node so they stay valid wherever the position recurs.
#[must_use]
pub fn score_to_tt(score: i32, ply: u8, win_score: i32) -> i32 {
    let ply = i32::from(ply);
    if score >= win_score - WIN_WINDOW {
        score + ply
    } else if score <= WIN_WINDOW - win_score {
        score - ply
    } else {
        score
    }
}

#[must_use]
pub fn score_from_tt(score: i32, ply: u8, win_score: i32) -> i32 {
    let ply = i32::from(ply);
    if score >= win_score - WIN_WINDOW {
        score - ply
    } else if score <= WIN_WINDOW - win_score {
        score + ply
    } else {
        score
    }
}

/// Fixed-size, power-of-two table keyed by position signature.
pub struct TranspositionTable {
    entries: Vec<TTEntry>,
    mask: usize,
}

impl TranspositionTable {
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let entry_size = std::mem::size_of::<TTEntry>();
        let num_entries = (size_mb * 1024 * 1024) / entry_size;

        // Largest power of two that fits the budget
        let mut size = 1;
        while size <= num_entries {
            size *= 2;
        }
        size /= 2;

        if size < 1024 {
            size = 1024;
        }

        Self {
            entries: vec![TTEntry::default(); size],
            mask: size - 1,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn slot(&self, key: u64) -> usize {
        (key as usize) & self.mask
    }

    #[must_use]
    pub fn probe(&self, key: u64) -> Option<TTEntry> {
        self.entries
            .get(self.slot(key))
            .filter(|entry| entry.key == key)
            .copied()
    }

    pub fn store(
        &mut self,
        key: u64,
        best_move: Option<Move>,
        score: i32,
        depth: u8,
        flag: TTFlag,
    ) {
        let idx = self.slot(key);
        let Some(entry) = self.entries.get_mut(idx) else {
            return;
        };

        // Replace on collision, or when the new result is at least as deep.
        if entry.key != key || depth >= entry.depth {
            *entry = TTEntry {
                key,
                best_move,
                score,
                depth,
                flag,
            };
        }
    }

    pub fn clear(&mut self) {
        self.entries.fill(TTEntry::default());
    }
}
