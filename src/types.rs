//! Type aliases and shared types for BPE training.
//!
//! These type aliases provide semantic clarity throughout the codebase.

/// Represents a token identifier in the vocabulary.
///
/// Initial symbols are usually the raw bytes 0-255; every accepted merge
/// mints one new id above them.
pub type Token = usize;

/// Index of an occurrence node inside the node arena.
///
/// Indices stay valid for the whole training run because nodes are only
/// ever tombstoned, never removed.
pub type NodeIdx = usize;

/// Frequency count for token pairs during training.
pub type TokenFreq = usize;

/// A sequence of raw bytes.
///
/// Used for vocabulary entries: the bytes a token expands to.
pub type ByteSeq = Vec<u8>;

/// A recorded merge: the ordered pair that was replaced.
pub type Merge = (Token, Token);

/// A pair of adjacent tokens.
///
/// Ordered: `TokenPair(a, b)` and `TokenPair(b, a)` are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenPair(pub Token, pub Token);

impl From<TokenPair> for Merge {
    fn from(pair: TokenPair) -> Self {
        (pair.0, pair.1)
    }
}
