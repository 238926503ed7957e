use crate::engine::Move;
use std::ops::Index;

// A full side of Kings tops out near a hundred moves; chains are far fewer.
const MAX_MOVES: usize = 128;

/// Stack-allocated move buffer used inside the search loop.
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    count: usize,
}

impl Default for MoveList {
    fn default() -> Self {
        Self {
            moves: [Move::default(); MAX_MOVES],
            count: 0,
        }
    }
}

impl MoveList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mv: Move) {
        if let Some(slot) = self.moves.get_mut(self.count) {
            *slot = mv;
            self.count += 1;
        } else {
            debug_assert!(false, "MoveList overflow! Max moves: {MAX_MOVES}");
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.moves.get(0..self.count).unwrap_or(&[]).iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Move> {
        self.moves
            .get_mut(0..self.count)
            .unwrap_or(&mut [])
            .iter_mut()
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Move, &Move) -> std::cmp::Ordering,
    {
        if let Some(slice) = self.moves.get_mut(0..self.count) {
            slice.sort_by(compare);
        }
    }

    /// Stable sort, highest `score` first.
    pub fn sort_by_score(&mut self) {
        self.sort_by(|a, b| b.score.cmp(&a.score));
    }
}

impl FromIterator<Move> for MoveList {
    fn from_iter<I: IntoIterator<Item = Move>>(iter: I) -> Self {
        let mut list = Self::new();
        for mv in iter {
            list.push(mv);
        }
        list
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Index<usize> for MoveList {
    type Output = Move;

    // Out of range falls back to the (dummy) first slot instead of panicking.
    fn index(&self, index: usize) -> &Self::Output {
        let idx = if index < self.count { index } else { 0 };
        self.moves.get(idx).unwrap_or(&self.moves[0])
    }
}
