//! Incremental BPE training over a node arena.
//!
//! Each merge step pops the best pair from the lazy scheduler, mints a
//! vocabulary entry, then rewrites every recorded occurrence of the pair.
//! Only the pairs touching a rewritten occurrence are re-indexed, so no step
//! rescans the corpus.
//!
//! Per occurrence the order is fixed: remove the old neighbour pairs, splice
//! the arena, add the new neighbour pairs. Between steps the pair index then
//! matches the arena exactly.

use std::ops::ControlFlow;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle, style::TemplateError};
use rayon::prelude::*;

use crate::{
    arena::NodeArena,
    config::TrainerConfig,
    error::TrainError,
    pair_index::PairIndex,
    scheduler::MergeScheduler,
    types::{Merge, NodeIdx, Token, TokenFreq, TokenPair},
    vocab::Vocabulary,
};

/// BPE training state for one run.
///
/// Owns the arena, the pair index and the scheduler exclusively; nothing
/// else mutates them, so no locking is involved.
#[derive(Debug)]
pub struct BPETrainer {
    arena: NodeArena,

    /// Source of truth for pair frequencies and positions.
    index: PairIndex,

    /// Max heap of proposals. Contains stale entries.
    scheduler: MergeScheduler,

    vocab: Vocabulary,

    show_progress: bool,

    /// History of merges: (token_a, token_b) -> merged_token.
    merge_history: Vec<(Merge, Token)>,
}

impl BPETrainer {
    /// Validates the corpus against `vocab` and indexes every initial pair.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::UnknownToken`] for the first token (by sequence,
    /// then position) missing from `vocab`.
    ///
    /// # Example
    /// ```
    /// use bpe_core::{BPETrainer, TrainerConfig, Vocabulary};
    ///
    /// let sequences: Vec<Vec<usize>> = vec![b"abab".iter().map(|&b| b as usize).collect()];
    /// let mut trainer =
    ///     BPETrainer::new(&sequences, Vocabulary::byte_level(), &TrainerConfig::default())?;
    /// assert_eq!(trainer.train(10)?, 2);
    /// # Ok::<(), bpe_core::TrainError>(())
    /// ```
    pub fn new(
        sequences: &[Vec<Token>],
        vocab: Vocabulary,
        config: &TrainerConfig,
    ) -> Result<Self, TrainError> {
        validate(sequences, &vocab)?;

        let arena = NodeArena::build(sequences);
        let (index, first_seen) = PairIndex::initial_scan(&arena);

        let mut scheduler = MergeScheduler::new(config.tie_break);
        for pair in first_seen {
            scheduler.propose(pair, index.count(pair), &vocab)?;
        }

        log::info!(
            "Indexed {} sequences ({} tokens): {} distinct pairs",
            arena.num_sequences(),
            arena.len(),
            index.len()
        );

        Ok(Self {
            arena,
            index,
            scheduler,
            vocab,
            show_progress: config.show_progress,
            merge_history: Vec::new(),
        })
    }

    /// Performs one merge.
    ///
    /// Returns `Ok(false)` when no pair is left to merge.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::Vocab`] if the scheduler proposed a pair whose
    /// tokens are not in the vocabulary. That can only follow from broken
    /// bookkeeping, so training must not continue.
    pub fn merge_step(&mut self) -> Result<bool, TrainError> {
        let Some((merge_pair, merge_freq)) = self.scheduler.pop_best(&self.index) else {
            return Ok(false);
        };

        let new_tok = match self.vocab.push_merge(merge_pair.0, merge_pair.1) {
            Ok(tok) => tok,
            Err(e) => {
                log::error!("Cannot mint token for {merge_pair:?}: {e}");
                return Err(e.into());
            }
        };
        self.merge_history.push((merge_pair.into(), new_tok));

        log::debug!(
            "Merging pair ({}, {}) -> token {} (frequency {})",
            merge_pair.0,
            merge_pair.1,
            new_tok,
            merge_freq
        );

        // The whole occurrence set is consumed by this step.
        let positions = self.index.take(merge_pair);

        for pos in positions {
            let (left, right) = match self.get_merge_idxs(merge_pair, pos) {
                ControlFlow::Continue(idxs) => idxs,
                ControlFlow::Break(()) => continue,
            };

            let prev_idx = self.arena.node(left).prev_idx;
            let next_idx = self.arena.node(right).next_idx;

            self.remove_neighbours(merge_pair, left, right)?;
            let merged = self.arena.splice(left, right, new_tok);
            self.add_neighbours(new_tok, merged, prev_idx, next_idx)?;
        }

        Ok(true)
    }

    /// Runs up to `num_merges` merge steps and returns how many happened.
    ///
    /// Stops early, without error, once no pair is left.
    ///
    /// # Errors
    ///
    /// Propagates [`BPETrainer::merge_step`] failures and
    /// [`TrainError::ProgressBarSetup`].
    pub fn train(&mut self, num_merges: usize) -> Result<usize, TrainError> {
        log::info!(
            "Starting BPE training: {} merges requested, vocabulary size {}",
            num_merges,
            self.vocab.len()
        );

        let pb = if self.show_progress {
            progress_bar(num_merges as u64, "Merging pairs")?
        } else {
            let pb = ProgressBar::new(num_merges as u64);
            pb.set_draw_target(ProgressDrawTarget::hidden());
            pb
        };

        let mut merges_done = 0;
        let mut last_log_percent = 0;

        while merges_done < num_merges {
            if !self.merge_step()? {
                log::info!("No more pairs to merge after {merges_done} merges");
                break;
            }
            merges_done += 1;
            pb.inc(1);

            let current_percent = merges_done * 100 / num_merges;
            if current_percent > last_log_percent {
                log::info!(
                    "Progress: {}% ({}/{} merges), {} pairs live, {} queued proposals",
                    current_percent,
                    merges_done,
                    num_merges,
                    self.index.len(),
                    self.scheduler.len()
                );
                last_log_percent = current_percent;
            }
        }

        pb.finish_and_clear();
        log::info!(
            "Finished training: {} merges completed, vocabulary size {}",
            merges_done,
            self.vocab.len()
        );

        Ok(merges_done)
    }

    /// Current tokens of every sequence, in input order.
    pub fn encodings(&self) -> Vec<Vec<Token>> {
        self.arena.sequences()
    }

    /// Merges performed so far as `((left, right), merged_token)`.
    pub fn merge_history(&self) -> &[(Merge, Token)] {
        &self.merge_history
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Live frequency of `pair`.
    pub fn pair_count(&self, left: Token, right: Token) -> TokenFreq {
        self.index.count(TokenPair(left, right))
    }

    /// Every pair currently present with its frequency, in no particular order.
    pub fn pair_counts(&self) -> Vec<(Merge, TokenFreq)> {
        self.index
            .counts()
            .map(|(pair, freq)| (pair.into(), freq))
            .collect()
    }

    /// Logs the five most frequent pairs at debug level.
    pub fn log_state(&self) {
        let mut pairs = self.pair_counts();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for ((left, right), freq) in pairs.iter().take(5) {
            log::debug!("  ({left}, {right}) : {freq}");
        }
    }

    /// Consumes the trainer, returning `(vocabulary, merge_history, sequences)`.
    pub fn into_parts(self) -> (Vocabulary, Vec<(Merge, Token)>, Vec<Vec<Token>>) {
        let sequences = self.arena.sequences();
        (self.vocab, self.merge_history, sequences)
    }

    /// Checks that the occurrence at left node `pos` still holds `pair`.
    ///
    /// An occurrence from the snapshot may already have been consumed by an
    /// earlier one in the same step (runs like `a a a`).
    fn get_merge_idxs(&self, pair: TokenPair, pos: NodeIdx) -> ControlFlow<(), (NodeIdx, NodeIdx)> {
        match self.arena.pair_at(pos) {
            Some((right, live)) if live == pair => ControlFlow::Continue((pos, right)),
            _ => ControlFlow::Break(()),
        }
    }

    /// Drops the pairs that `left`/`right` formed with their outer neighbours.
    ///
    /// The merged pair itself at `left` needs no removal: its whole set was
    /// taken out of the index when the step started.
    fn remove_neighbours(
        &mut self,
        merge_pair: TokenPair,
        left: NodeIdx,
        right: NodeIdx,
    ) -> Result<(), TrainError> {
        if let Some(prev_idx) = self.arena.node(left).prev_idx {
            let old_pair = TokenPair(self.arena.node(prev_idx).token, merge_pair.0);
            self.remove_pair_at(prev_idx, old_pair)?;
        }

        if let Some(next_idx) = self.arena.node(right).next_idx {
            let old_pair = TokenPair(merge_pair.1, self.arena.node(next_idx).token);
            self.remove_pair_at(right, old_pair)?;
        }

        Ok(())
    }

    /// Indexes the pairs the merged node forms with its new neighbours.
    fn add_neighbours(
        &mut self,
        new_tok: Token,
        merged: NodeIdx,
        prev_idx: Option<NodeIdx>,
        next_idx: Option<NodeIdx>,
    ) -> Result<(), TrainError> {
        if let Some(prev_idx) = prev_idx {
            let new_pair = TokenPair(self.arena.node(prev_idx).token, new_tok);
            self.add_pair_at(prev_idx, new_pair)?;
        }

        if let Some(next_idx) = next_idx {
            let new_pair = TokenPair(new_tok, self.arena.node(next_idx).token);
            self.add_pair_at(merged, new_pair)?;
        }

        Ok(())
    }

    fn remove_pair_at(&mut self, idx: NodeIdx, pair: TokenPair) -> Result<(), TrainError> {
        if let Some(freq) = self.index.remove(pair, idx) {
            self.scheduler.propose(pair, freq, &self.vocab)?;
        }
        Ok(())
    }

    fn add_pair_at(&mut self, idx: NodeIdx, pair: TokenPair) -> Result<(), TrainError> {
        if let Some(freq) = self.index.add(pair, idx) {
            self.scheduler.propose(pair, freq, &self.vocab)?;
        }
        Ok(())
    }
}

/// Rejects corpora referencing tokens the vocabulary does not define.
///
/// Sequences are checked in parallel; the reported error is always the
/// first offender in input order.
fn validate(sequences: &[Vec<Token>], vocab: &Vocabulary) -> Result<(), TrainError> {
    let offender = sequences
        .par_iter()
        .enumerate()
        .find_map_first(|(sequence, tokens)| {
            tokens
                .iter()
                .position(|&t| !vocab.contains(t))
                .map(|position| TrainError::UnknownToken {
                    sequence,
                    position,
                    token: tokens[position],
                })
        });

    match offender {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn progress_bar(size: u64, msg: impl Into<String>) -> Result<ProgressBar, TemplateError> {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {msg:<30!} {wide_bar} {pos}/{len}")?;

    pb.set_style(style);
    pb.set_message(msg.into());
    pb.enable_steady_tick(std::time::Duration::from_secs(1));

    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;

    fn small_vocab() -> Vocabulary {
        Vocabulary::new([(0, b"x".to_vec()), (1, b"y".to_vec()), (2, b"z".to_vec())])
            .expect("valid vocab")
    }

    fn trainer(sequences: &[Vec<Token>], tie_break: TieBreak) -> BPETrainer {
        let config = TrainerConfig::default().with_tie_break(tie_break);
        BPETrainer::new(sequences, small_vocab(), &config).expect("valid corpus")
    }

    /// Recounts every adjacent pair straight from the sequences.
    fn recount(trainer: &BPETrainer) -> Vec<(Merge, TokenFreq)> {
        let mut counts = std::collections::HashMap::new();
        for seq in trainer.encodings() {
            for w in seq.windows(2) {
                *counts.entry((w[0], w[1])).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }

    fn indexed(trainer: &BPETrainer) -> Vec<(Merge, TokenFreq)> {
        let mut counts = trainer.pair_counts();
        counts.sort();
        counts
    }

    #[test]
    fn test_basic_merge() {
        let tokens = vec![vec![0, 1, 0, 0, 1, 1, 0, 0]];
        let mut trainer = trainer(&tokens, TieBreak::Insertion);
        assert_eq!(trainer.train(3).expect("training succeeds"), 3);
        // Should have fewer tokens than we started with.
        assert!(trainer.encodings()[0].len() < 8);
        assert_eq!(trainer.vocab().len(), 6);
    }

    #[test]
    fn test_empty_sequence() {
        let mut trainer = trainer(&[vec![]], TieBreak::Content);
        assert_eq!(trainer.encodings(), vec![Vec::<Token>::new()]);
        assert!(!trainer.merge_step().expect("no failure"));
    }

    #[test]
    fn test_single_token() {
        let mut trainer = trainer(&[vec![0]], TieBreak::Content);
        assert_eq!(trainer.train(4).expect("training succeeds"), 0);
        assert_eq!(trainer.encodings(), vec![vec![0]]);
    }

    #[test]
    fn test_overlapping_run_merges_left_first() {
        let mut trainer = trainer(&[vec![0, 0, 0, 1]], TieBreak::Insertion);
        assert!(trainer.merge_step().expect("no failure"));

        assert_eq!(trainer.merge_history(), &[((0, 0), 3)]);
        assert_eq!(trainer.encodings(), vec![vec![3, 0, 1]]);
        assert_eq!(indexed(&trainer), recount(&trainer));
    }

    #[test]
    fn test_neighbour_pairs_reindexed() {
        let mut trainer = trainer(&[vec![2, 0, 1, 2, 0, 1, 0, 1]], TieBreak::Insertion);
        assert!(trainer.merge_step().expect("no failure"));

        assert_eq!(trainer.encodings(), vec![vec![2, 3, 2, 3, 3]]);
        assert_eq!(trainer.pair_count(2, 3), 2);
        assert_eq!(trainer.pair_count(3, 2), 1);
        assert_eq!(trainer.pair_count(3, 3), 1);
        assert_eq!(trainer.pair_count(0, 1), 0);
        assert_eq!(trainer.pair_count(1, 2), 0);
        assert_eq!(indexed(&trainer), recount(&trainer));
    }

    #[test]
    fn test_index_matches_recount_every_step() {
        let sequences = vec![
            vec![0, 1, 0, 1, 2, 0, 1, 2, 2, 2],
            vec![2, 2, 0, 1],
            vec![],
            vec![1, 1, 1, 1, 1],
        ];
        let mut trainer = trainer(&sequences, TieBreak::Content);
        while trainer.merge_step().expect("no failure") {
            assert_eq!(indexed(&trainer), recount(&trainer));
        }
        assert!(trainer.pair_counts().is_empty());
    }

    #[test]
    fn test_merges_across_sequences() {
        let mut trainer = trainer(&[vec![0, 1], vec![2, 0, 1], vec![0, 1, 2]], TieBreak::Content);
        assert!(trainer.merge_step().expect("no failure"));
        assert_eq!(trainer.encodings(), vec![vec![3], vec![2, 3], vec![3, 2]]);
    }

    #[test]
    fn test_unknown_token_rejected() {
        let config = TrainerConfig::default();
        let result = BPETrainer::new(&[vec![0, 1], vec![1, 7, 9]], small_vocab(), &config);
        assert!(matches!(
            result,
            Err(TrainError::UnknownToken {
                sequence: 1,
                position: 1,
                token: 7
            })
        ));
    }

    #[test]
    fn test_into_parts() {
        let mut trainer = trainer(&[vec![0, 1, 0, 1]], TieBreak::Content);
        trainer.train(1).expect("training succeeds");
        let (vocab, history, sequences) = trainer.into_parts();

        assert_eq!(history, vec![((0, 1), 3)]);
        assert_eq!(sequences, vec![vec![3, 3]]);
        assert_eq!(vocab.bytes_of(3), Ok(&b"xy"[..]));
    }
}
