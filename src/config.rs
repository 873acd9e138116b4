//! Training options.

/// How the scheduler orders pairs that occur equally often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Prefer the pair whose `(bytes(left), bytes(right))` is lexicographically
    /// greatest. Depends only on the data, so identical corpora always train
    /// identical vocabularies.
    #[default]
    Content,
    /// Prefer whichever proposal reached the scheduler first.
    ///
    /// Initial pairs are proposed in order of first appearance, scanning the
    /// sequences left to right.
    Insertion,
}

/// Options for a training run.
///
/// # Example
/// ```
/// use bpe_core::{TieBreak, TrainerConfig};
///
/// let config = TrainerConfig::default()
///     .with_tie_break(TieBreak::Insertion)
///     .with_progress(true);
/// assert!(config.show_progress);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TrainerConfig {
    /// Tie-break policy for equal-frequency pairs.
    pub tie_break: TieBreak,

    /// Render a terminal progress bar while merging.
    pub show_progress: bool,
}

impl TrainerConfig {
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}
