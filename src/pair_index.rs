//! Pair index: pair -> set of left nodes where that pair currently occurs.
//!
//! The size of a pair's occurrence set is the authoritative frequency of the
//! pair. Only [`PairIndex::add`] and [`PairIndex::remove`] mutate a set, and
//! the trainer calls them exactly when neighbour relationships change.

use std::collections::{HashMap, HashSet};

use crate::{
    arena::NodeArena,
    types::{NodeIdx, TokenFreq, TokenPair},
};

#[derive(Debug, Default)]
pub(crate) struct PairIndex {
    /// pair -> indices of the left node of every live occurrence.
    occurrences: HashMap<TokenPair, HashSet<NodeIdx>>,
}

impl PairIndex {
    /// Indexes every live adjacent pair in the arena.
    ///
    /// Also returns the distinct pairs in order of first appearance, which is
    /// the order the scheduler gets seeded in.
    ///
    /// # Time Complexity
    /// O(N) in the number of nodes.
    pub(crate) fn initial_scan(arena: &NodeArena) -> (Self, Vec<TokenPair>) {
        let mut occurrences: HashMap<TokenPair, HashSet<NodeIdx>> = HashMap::new();
        let mut first_seen = Vec::new();

        for idx in 0..arena.len() {
            if let Some((_, pair)) = arena.pair_at(idx) {
                let set = occurrences.entry(pair).or_insert_with(|| {
                    first_seen.push(pair);
                    HashSet::new()
                });
                set.insert(idx);
            }
        }

        (Self { occurrences }, first_seen)
    }

    /// Records an occurrence of `pair` whose left node is `idx`.
    ///
    /// Returns the new frequency if the set grew, `None` if the occurrence
    /// was already recorded.
    pub(crate) fn add(&mut self, pair: TokenPair, idx: NodeIdx) -> Option<TokenFreq> {
        let set = self.occurrences.entry(pair).or_default();
        set.insert(idx).then_some(set.len())
    }

    /// Forgets the occurrence of `pair` at left node `idx`.
    ///
    /// Drops the pair entirely once its last occurrence is gone. Returns the
    /// remaining frequency when the pair still exists and actually shrank.
    pub(crate) fn remove(&mut self, pair: TokenPair, idx: NodeIdx) -> Option<TokenFreq> {
        let set = self.occurrences.get_mut(&pair)?;
        if !set.remove(&idx) {
            return None;
        }
        if set.is_empty() {
            self.occurrences.remove(&pair);
            return None;
        }
        Some(set.len())
    }

    /// Removes `pair` from the index and returns its occurrences in
    /// ascending node order.
    pub(crate) fn take(&mut self, pair: TokenPair) -> Vec<NodeIdx> {
        let mut positions: Vec<NodeIdx> = self
            .occurrences
            .remove(&pair)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        positions.sort_unstable();
        positions
    }

    /// Current frequency of `pair`; zero if it does not occur.
    pub(crate) fn count(&self, pair: TokenPair) -> TokenFreq {
        self.occurrences.get(&pair).map_or(0, HashSet::len)
    }

    /// Number of distinct pairs currently present.
    pub(crate) fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub(crate) fn counts(&self) -> impl Iterator<Item = (TokenPair, TokenFreq)> + '_ {
        self.occurrences.iter().map(|(&pair, set)| (pair, set.len()))
    }
}
