//! Error types for vocabulary lookups and training runs.

use std::fmt;

use indicatif::style::TemplateError;

use crate::types::Token;

/// Errors that can occur when reading from the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabError {
    /// Token ID not found in vocabulary.
    UnknownToken(Token),
}

impl fmt::Display for VocabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken(t) => write!(f, "unknown token id: {t}"),
        }
    }
}

impl std::error::Error for VocabError {}

/// Errors that can occur while setting up or running a training run.
///
/// Degenerate corpora, a zero merge budget and running out of pairs are not
/// errors; they simply produce fewer (or no) merges.
#[derive(Debug)]
pub enum TrainError {
    /// A token in the corpus has no entry in the initial vocabulary.
    UnknownToken {
        /// Index of the offending sequence.
        sequence: usize,
        /// Position of the token inside that sequence.
        position: usize,
        /// The token id itself.
        token: Token,
    },
    /// An initial vocabulary entry maps to an empty byte string.
    EmptyVocabEntry(Token),
    /// Vocabulary lookup failed mid-training.
    ///
    /// Only reachable through an internal bookkeeping bug; training is aborted.
    Vocab(VocabError),
    /// Progress bar template string was invalid.
    ProgressBarSetup(TemplateError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken {
                sequence,
                position,
                token,
            } => write!(
                f,
                "token {token} at position {position} of sequence {sequence} is not in the initial vocabulary"
            ),
            Self::EmptyVocabEntry(t) => write!(f, "vocabulary entry {t} has no bytes"),
            Self::Vocab(e) => write!(f, "internal consistency failure: {e}"),
            Self::ProgressBarSetup(msg) => write!(f, "template parsing failed: {msg}"),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Vocab(e) => Some(e),
            Self::ProgressBarSetup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VocabError> for TrainError {
    fn from(e: VocabError) -> Self {
        Self::Vocab(e)
    }
}

impl From<TemplateError> for TrainError {
    fn from(e: TemplateError) -> Self {
        Self::ProgressBarSetup(e)
    }
}
