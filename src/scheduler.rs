//! Lazily validated max-heap proposing the next pair to merge.
//!
//! Every change to a pair's frequency pushes a fresh entry instead of
//! updating the old one, so the heap holds stale entries. They are filtered
//! out on the read path by comparing against the pair index.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{
    config::TieBreak,
    error::VocabError,
    pair_index::PairIndex,
    types::{ByteSeq, TokenFreq, TokenPair},
    vocab::Vocabulary,
};

/// Item in the max heap.
///
/// A disposable snapshot: `freq` was the pair's frequency at push time and
/// may no longer be current.
#[derive(Debug, PartialEq, Eq)]
struct HeapItem {
    freq: TokenFreq,

    /// Byte strings of both halves, only filled in under [`TieBreak::Content`].
    content: Option<(ByteSeq, ByteSeq)>,

    /// Push order; lower was pushed earlier.
    seq: u64,

    pair: TokenPair,
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Highest freq on top, then greatest content, then earliest push.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.freq
            .cmp(&other.freq)
            .then_with(|| self.content.cmp(&other.content))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
pub(crate) struct MergeScheduler {
    heap: BinaryHeap<HeapItem>,
    tie_break: TieBreak,
    next_seq: u64,
}

impl MergeScheduler {
    pub(crate) fn new(tie_break: TieBreak) -> Self {
        Self {
            heap: BinaryHeap::new(),
            tie_break,
            next_seq: 0,
        }
    }

    /// Pushes a proposal for `pair` at frequency `freq`.
    ///
    /// # Errors
    ///
    /// Returns [`VocabError::UnknownToken`] if content tie-breaking needs the
    /// bytes of a token the vocabulary does not have.
    pub(crate) fn propose(
        &mut self,
        pair: TokenPair,
        freq: TokenFreq,
        vocab: &Vocabulary,
    ) -> Result<(), VocabError> {
        let content = match self.tie_break {
            TieBreak::Content => Some((
                vocab.bytes_of(pair.0)?.to_vec(),
                vocab.bytes_of(pair.1)?.to_vec(),
            )),
            TieBreak::Insertion => None,
        };

        self.heap.push(HeapItem {
            freq,
            content,
            seq: self.next_seq,
            pair,
        });
        self.next_seq += 1;

        Ok(())
    }

    /// Pops until an entry agrees with the live frequency in `index`.
    ///
    /// Returns `None` once the heap is exhausted, meaning no pair is left.
    pub(crate) fn pop_best(&mut self, index: &PairIndex) -> Option<(TokenPair, TokenFreq)> {
        while let Some(entry) = self.heap.pop() {
            let live = index.count(entry.pair);
            if live > 0 && live == entry.freq {
                return Some((entry.pair, entry.freq));
            }
            // Stale or extinct, keep popping.
        }

        None
    }

    /// Number of queued proposals, stale ones included.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(entries: &[(TokenPair, usize)]) -> PairIndex {
        let mut index = PairIndex::default();
        let mut node = 0;
        for &(pair, freq) in entries {
            for _ in 0..freq {
                index.add(pair, node);
                node += 1;
            }
        }
        index
    }

    #[test]
    fn test_highest_frequency_wins() {
        let vocab = Vocabulary::byte_level();
        let index = index_with(&[(TokenPair(1, 2), 2), (TokenPair(3, 4), 5)]);
        let mut scheduler = MergeScheduler::new(TieBreak::Insertion);
        scheduler.propose(TokenPair(1, 2), 2, &vocab).expect("known ids");
        scheduler.propose(TokenPair(3, 4), 5, &vocab).expect("known ids");

        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(3, 4), 5)));
        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(1, 2), 2)));
        assert_eq!(scheduler.pop_best(&index), None);
    }

    #[test]
    fn test_stale_entries_skipped() {
        let vocab = Vocabulary::byte_level();
        let mut index = index_with(&[(TokenPair(1, 2), 3), (TokenPair(5, 6), 2)]);
        let mut scheduler = MergeScheduler::new(TieBreak::Insertion);
        scheduler.propose(TokenPair(1, 2), 3, &vocab).expect("known ids");
        scheduler.propose(TokenPair(5, 6), 2, &vocab).expect("known ids");

        // (1, 2) drops to 1 after its entry was pushed.
        index.remove(TokenPair(1, 2), 0);
        index.remove(TokenPair(1, 2), 1);
        scheduler.propose(TokenPair(1, 2), 1, &vocab).expect("known ids");

        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(5, 6), 2)));
        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(1, 2), 1)));
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn test_extinct_pair_skipped() {
        let vocab = Vocabulary::byte_level();
        let index = PairIndex::default();
        let mut scheduler = MergeScheduler::new(TieBreak::Content);
        scheduler.propose(TokenPair(1, 2), 4, &vocab).expect("known ids");
        assert_eq!(scheduler.pop_best(&index), None);
    }

    #[test]
    fn test_insertion_tie_break() {
        let vocab = Vocabulary::byte_level();
        let index = index_with(&[(TokenPair(200, 200), 2), (TokenPair(1, 1), 2)]);
        let mut scheduler = MergeScheduler::new(TieBreak::Insertion);
        scheduler.propose(TokenPair(1, 1), 2, &vocab).expect("known ids");
        scheduler.propose(TokenPair(200, 200), 2, &vocab).expect("known ids");

        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(1, 1), 2)));
    }

    #[test]
    fn test_content_tie_break() {
        let vocab = Vocabulary::byte_level();
        let index = index_with(&[
            (TokenPair(98, 97), 2),
            (TokenPair(98, 99), 2),
            (TokenPair(97, 122), 2),
        ]);
        let mut scheduler = MergeScheduler::new(TieBreak::Content);
        for pair in [TokenPair(98, 97), TokenPair(98, 99), TokenPair(97, 122)] {
            scheduler.propose(pair, 2, &vocab).expect("known ids");
        }

        // ("b", "c") > ("b", "a") > ("a", "z")
        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(98, 99), 2)));
        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(98, 97), 2)));
        assert_eq!(scheduler.pop_best(&index), Some((TokenPair(97, 122), 2)));
    }

    #[test]
    fn test_content_needs_known_tokens() {
        let vocab = Vocabulary::byte_level();
        let mut scheduler = MergeScheduler::new(TieBreak::Content);
        assert_eq!(
            scheduler.propose(TokenPair(1, 4096), 1, &vocab),
            Err(VocabError::UnknownToken(4096))
        );
    }
}
