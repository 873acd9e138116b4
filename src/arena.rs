//! Node arena holding every token occurrence of the corpus.
//!
//! Each sequence is a doubly-linked chain of nodes stored in one flat `Vec`.
//! Links are arena indices rather than references, and nodes are never
//! removed: a merged-away node is tombstoned so that indices captured
//! earlier (e.g. in the pair index) stay valid.

use crate::types::{NodeIdx, Token, TokenPair};

/// One occurrence of a token inside one sequence.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// The token identifier at this position.
    pub(crate) token: Token,

    /// Index of the previous node in the sequence, if any.
    pub(crate) prev_idx: Option<NodeIdx>,

    /// Index of the next node in the sequence, if any.
    pub(crate) next_idx: Option<NodeIdx>,

    /// Index of the sequence owning this node.
    pub(crate) seq: usize,

    /// `false` once the node has been consumed by a merge.
    ///
    /// Dead nodes keep their token and links frozen but are never reachable
    /// from a live chain.
    pub(crate) alive: bool,
}

/// Flat, append-only storage for all sequence chains.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Node>,

    /// Head node of each sequence; `None` for an empty sequence.
    heads: Vec<Option<NodeIdx>>,
}

impl NodeArena {
    /// Builds one chain per input sequence.
    ///
    /// # Time Complexity
    /// Linear in the total number of tokens.
    pub(crate) fn build(sequences: &[Vec<Token>]) -> Self {
        let total: usize = sequences.iter().map(Vec::len).sum();
        let mut nodes = Vec::with_capacity(total);
        let mut heads = Vec::with_capacity(sequences.len());

        for (seq, tokens) in sequences.iter().enumerate() {
            if tokens.is_empty() {
                heads.push(None);
                continue;
            }

            let start = nodes.len();
            heads.push(Some(start));
            let n = tokens.len();

            for (i, &token) in tokens.iter().enumerate() {
                let idx = start + i;
                nodes.push(Node {
                    token,
                    prev_idx: if i > 0 { Some(idx - 1) } else { None },
                    next_idx: if i + 1 < n { Some(idx + 1) } else { None },
                    seq,
                    alive: true,
                });
            }
        }

        Self { nodes, heads }
    }

    /// Number of nodes ever allocated, dead ones included.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn num_sequences(&self) -> usize {
        self.heads.len()
    }

    pub(crate) fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    /// Returns the right node index and the pair starting at `idx`, if `idx`
    /// and its successor are both alive.
    pub(crate) fn pair_at(&self, idx: NodeIdx) -> Option<(NodeIdx, TokenPair)> {
        let left = self.nodes.get(idx)?;
        if !left.alive {
            return None;
        }
        let right_idx = left.next_idx?;
        let right = &self.nodes[right_idx];
        if !right.alive {
            return None;
        }
        Some((right_idx, TokenPair(left.token, right.token)))
    }

    /// Replaces the adjacent live nodes `left` and `right` with one new node
    /// carrying `token`, and returns the new node's index.
    ///
    /// Neighbours (and the sequence head, if `left` was the head) are
    /// repointed at the new node; `left` and `right` are tombstoned. Storage
    /// is never freed.
    pub(crate) fn splice(&mut self, left: NodeIdx, right: NodeIdx, token: Token) -> NodeIdx {
        debug_assert_eq!(self.nodes[left].next_idx, Some(right));
        debug_assert!(self.nodes[left].alive && self.nodes[right].alive);

        let prev_idx = self.nodes[left].prev_idx;
        let next_idx = self.nodes[right].next_idx;
        let seq = self.nodes[left].seq;

        let new_idx = self.nodes.len();
        self.nodes.push(Node {
            token,
            prev_idx,
            next_idx,
            seq,
            alive: true,
        });

        match prev_idx {
            Some(p) => self.nodes[p].next_idx = Some(new_idx),
            None => self.heads[seq] = Some(new_idx),
        }
        if let Some(n) = next_idx {
            self.nodes[n].prev_idx = Some(new_idx);
        }

        self.nodes[left].alive = false;
        self.nodes[right].alive = false;

        new_idx
    }

    /// Current tokens of one sequence, head to tail.
    pub(crate) fn sequence(&self, seq: usize) -> Vec<Token> {
        let mut result = Vec::new();
        let mut current = self.heads[seq];

        while let Some(idx) = current {
            let node = &self.nodes[idx];
            result.push(node.token);
            current = node.next_idx;
        }

        result
    }

    /// Current tokens of every sequence, in input order.
    pub(crate) fn sequences(&self) -> Vec<Vec<Token>> {
        (0..self.heads.len()).map(|s| self.sequence(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_links_each_sequence() {
        let arena = NodeArena::build(&[vec![1, 2, 3], vec![], vec![4]]);
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.num_sequences(), 3);
        assert_eq!(arena.sequences(), vec![vec![1, 2, 3], vec![], vec![4]]);

        // Chains never cross sequence boundaries.
        assert_eq!(arena.node(2).next_idx, None);
        assert_eq!(arena.node(3).prev_idx, None);
        assert_eq!(arena.node(3).seq, 2);
    }

    #[test]
    fn test_pair_at() {
        let arena = NodeArena::build(&[vec![1, 2], vec![3]]);
        assert_eq!(arena.pair_at(0), Some((1, TokenPair(1, 2))));
        assert_eq!(arena.pair_at(1), None);
        assert_eq!(arena.pair_at(2), None);
        assert_eq!(arena.pair_at(99), None);
    }

    #[test]
    fn test_splice_middle() {
        let mut arena = NodeArena::build(&[vec![1, 2, 3, 4]]);
        let new_idx = arena.splice(1, 2, 9);

        assert_eq!(new_idx, 4);
        assert_eq!(arena.sequence(0), vec![1, 9, 4]);
        assert!(!arena.node(1).alive);
        assert!(!arena.node(2).alive);
        assert_eq!(arena.node(0).next_idx, Some(new_idx));
        assert_eq!(arena.node(3).prev_idx, Some(new_idx));
    }

    #[test]
    fn test_splice_updates_head() {
        let mut arena = NodeArena::build(&[vec![5], vec![1, 2]]);
        let new_idx = arena.splice(1, 2, 7);

        assert_eq!(arena.sequence(1), vec![7]);
        assert_eq!(arena.node(new_idx).prev_idx, None);
        assert_eq!(arena.node(new_idx).next_idx, None);
        assert_eq!(arena.node(new_idx).seq, 1);
        assert_eq!(arena.sequence(0), vec![5]);
    }

    #[test]
    fn test_dead_node_links_are_frozen() {
        let mut arena = NodeArena::build(&[vec![1, 2, 3]]);
        arena.splice(0, 1, 8);
        // Node 0 still remembers its old successor but is unreachable.
        assert_eq!(arena.node(0).next_idx, Some(1));
        assert_eq!(arena.pair_at(0), None);
        assert_eq!(arena.sequence(0), vec![8, 3]);
    }
}
