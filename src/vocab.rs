//! Append-only token id -> byte string table.

use std::collections::BTreeMap;

use crate::{
    error::{TrainError, VocabError},
    types::{ByteSeq, Token},
};

/// First id above the single-byte range.
pub const BYTE_RANGE: Token = 256;

/// Vocabulary built up during training.
///
/// Entries are never changed or removed; each accepted merge appends exactly
/// one entry whose bytes are the concatenation of its two parents.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: BTreeMap<Token, ByteSeq>,

    /// Id the next merge will be assigned.
    next_id: Token,
}

impl Vocabulary {
    /// Creates a vocabulary from a caller-supplied table.
    ///
    /// When the ids are exactly `0..len`, merged tokens continue at `len`.
    /// Otherwise they take the first free ids at or above [`BYTE_RANGE`],
    /// skipping anything the caller already occupies.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::EmptyVocabEntry`] if any entry has no bytes.
    pub fn new(entries: impl IntoIterator<Item = (Token, ByteSeq)>) -> Result<Self, TrainError> {
        let entries: BTreeMap<Token, ByteSeq> = entries.into_iter().collect();

        if let Some((&token, _)) = entries.iter().find(|(_, bytes)| bytes.is_empty()) {
            return Err(TrainError::EmptyVocabEntry(token));
        }

        // BTreeMap keys are sorted, so the ids are implicit iff the last one is len - 1.
        let implicit = entries
            .keys()
            .next_back()
            .is_none_or(|&max| max + 1 == entries.len());

        let mut vocab = Self {
            entries,
            next_id: 0,
        };
        vocab.next_id = if implicit {
            vocab.entries.len()
        } else {
            vocab.first_free(BYTE_RANGE)
        };

        Ok(vocab)
    }

    /// The 256 single-byte tokens.
    pub fn byte_level() -> Self {
        Self {
            entries: (0..BYTE_RANGE).map(|b| (b, vec![b as u8])).collect(),
            next_id: BYTE_RANGE,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.contains_key(&token)
    }

    /// Id the next merge will receive.
    pub fn next_id(&self) -> Token {
        self.next_id
    }

    /// Bytes that `token` expands to.
    ///
    /// # Errors
    ///
    /// Returns [`VocabError::UnknownToken`] if the id was never assigned.
    pub fn bytes_of(&self, token: Token) -> Result<&[u8], VocabError> {
        self.entries
            .get(&token)
            .map(Vec::as_slice)
            .ok_or(VocabError::UnknownToken(token))
    }

    /// Mints a token for the pair `(left, right)` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`VocabError::UnknownToken`] if either parent is missing; the
    /// vocabulary is left untouched in that case.
    pub(crate) fn push_merge(&mut self, left: Token, right: Token) -> Result<Token, VocabError> {
        let left_bytes = self.bytes_of(left)?;
        let right_bytes = self.bytes_of(right)?;

        let mut bytes = Vec::with_capacity(left_bytes.len() + right_bytes.len());
        bytes.extend_from_slice(left_bytes);
        bytes.extend_from_slice(right_bytes);

        let id = self.next_id;
        self.entries.insert(id, bytes);
        self.next_id = self.first_free(id + 1);

        Ok(id)
    }

    /// Concatenates the bytes of `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`VocabError::UnknownToken`] on the first id not in the vocabulary.
    pub fn decode(&self, tokens: &[Token]) -> Result<ByteSeq, VocabError> {
        let mut result = Vec::new();
        for &token in tokens {
            result.extend_from_slice(self.bytes_of(token)?);
        }
        Ok(result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, &[u8])> + '_ {
        self.entries.iter().map(|(&t, b)| (t, b.as_slice()))
    }

    pub fn into_map(self) -> BTreeMap<Token, ByteSeq> {
        self.entries
    }

    fn first_free(&self, mut id: Token) -> Token {
        while self.entries.contains_key(&id) {
            id += 1;
        }
        id
    }
}
