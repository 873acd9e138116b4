//! Incremental BPE (Byte-Pair Encoding) vocabulary trainer.
//!
//! Takes a corpus already split into token sequences plus an initial
//! vocabulary, and repeatedly merges the most frequent adjacent pair. Pair
//! statistics are maintained incrementally with a node arena, a pair index
//! and a lazily validated max-heap, in the spirit of Algorithm 2 from
//! "Byte Pair Encoding is Suboptimal for Language Model Pretraining"
//! https://aclanthology.org/2023.findings-acl.38.pdf
//!
//! Pre-tokenization, file formats and encoding new text are left to callers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]

mod arena;
mod bpe_trainer;
mod config;
mod error;
mod pair_index;
mod scheduler;
mod types;
mod vocab;

pub use bpe_trainer::BPETrainer;
pub use config::{TieBreak, TrainerConfig};
pub use error::{TrainError, VocabError};
pub use types::{ByteSeq, Merge, Token, TokenFreq};
pub use vocab::{BYTE_RANGE, Vocabulary};

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// Initial vocabulary plus one entry per merge.
    pub vocab: Vocabulary,

    /// Merged pairs in the order they were accepted.
    pub merges: Vec<Merge>,

    /// Id minted by each merge, parallel to `merges`.
    pub merge_ids: Vec<Token>,

    /// The corpus after all merges.
    pub sequences: Vec<Vec<Token>>,
}

impl TrainOutput {
    /// Merges expressed as the byte strings of their two halves.
    ///
    /// # Errors
    ///
    /// Returns [`VocabError::UnknownToken`] if a merge refers to a token
    /// missing from `vocab`, which a trained output never does.
    pub fn merge_bytes(&self) -> Result<Vec<(&[u8], &[u8])>, VocabError> {
        self.merges
            .iter()
            .map(|&(a, b)| -> Result<_, VocabError> {
                Ok((self.vocab.bytes_of(a)?, self.vocab.bytes_of(b)?))
            })
            .collect()
    }
}

/// Trains up to `merge_budget` merges with the default configuration.
///
/// Stops early once no adjacent pair is left; fewer merges than requested is
/// not an error.
///
/// # Errors
///
/// Returns [`TrainError::UnknownToken`] if a sequence uses a token absent from
/// `initial_vocab`, and [`TrainError::EmptyVocabEntry`] for empty entries.
///
/// # Example
/// ```
/// let sequences: Vec<Vec<usize>> = vec![vec![0, 0, 0, 1]];
/// let vocab = [(0, b"x".to_vec()), (1, b"y".to_vec())];
///
/// let out = bpe_core::train(&sequences, vocab, 1)?;
/// assert_eq!(out.merges, vec![(0, 0)]);
/// assert_eq!(out.sequences, vec![vec![2, 0, 1]]);
/// assert_eq!(out.vocab.bytes_of(2)?, b"xx");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn train(
    sequences: &[Vec<Token>],
    initial_vocab: impl IntoIterator<Item = (Token, ByteSeq)>,
    merge_budget: usize,
) -> Result<TrainOutput, TrainError> {
    train_with_config(
        sequences,
        initial_vocab,
        merge_budget,
        &TrainerConfig::default(),
    )
}

/// Trains until the vocabulary holds `vocab_size` entries or no pair is left.
///
/// A target at or below the initial vocabulary size performs no merges.
///
/// # Errors
///
/// Same as [`train`].
pub fn train_to_vocab_size(
    sequences: &[Vec<Token>],
    initial_vocab: impl IntoIterator<Item = (Token, ByteSeq)>,
    vocab_size: usize,
    config: &TrainerConfig,
) -> Result<TrainOutput, TrainError> {
    let vocab = Vocabulary::new(initial_vocab)?;
    let budget = vocab_size.saturating_sub(vocab.len());
    run(sequences, vocab, budget, config)
}

/// Same as [`train`] with explicit options.
///
/// # Errors
///
/// Same as [`train`], plus [`TrainError::ProgressBarSetup`].
pub fn train_with_config(
    sequences: &[Vec<Token>],
    initial_vocab: impl IntoIterator<Item = (Token, ByteSeq)>,
    merge_budget: usize,
    config: &TrainerConfig,
) -> Result<TrainOutput, TrainError> {
    let vocab = Vocabulary::new(initial_vocab)?;
    run(sequences, vocab, merge_budget, config)
}

fn run(
    sequences: &[Vec<Token>],
    vocab: Vocabulary,
    merge_budget: usize,
    config: &TrainerConfig,
) -> Result<TrainOutput, TrainError> {
    let mut trainer = BPETrainer::new(sequences, vocab, config)?;
    trainer.train(merge_budget)?;

    let (vocab, history, sequences) = trainer.into_parts();
    let (merges, merge_ids): (Vec<Merge>, Vec<Token>) = history.into_iter().unzip();

    Ok(TrainOutput {
        vocab,
        merges,
        merge_ids,
        sequences,
    })
}
