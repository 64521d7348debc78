//! # Incremental Reuse
//!
//! Matches unchanged subtrees of a previous parse against an edit
//! description so the parser can shift them wholesale instead of reparsing
//! their contents.
//!
//! The edit description is a sorted, non-overlapping list of
//! [`ChangedRange`]s pairing pre-edit (`a`) and post-edit (`b`)
//! coordinates. Everything between changes is an *unchanged span*; a
//! tagged subtree is reusable when its range **and its recorded lookahead**
//! fit inside one span, which extends the discarded region around an edit
//! to the nearest token boundary rather than a fixed fudge distance.
//! Packed buffers are atomic: a change touching a buffer discards it
//! entirely, and buffers are never reused on their own.
//!
//! Candidates are indexed by their post-edit start position so the parser
//! can probe the map before tokenizing.

use crate::syntax::{Tree, TreeChild};
use ahash::RandomState;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// One edited region: `[from_a, to_a)` in pre-edit coordinates was replaced
/// by `[from_b, to_b)` in post-edit coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub from_a: u32,
    pub to_a: u32,
    pub from_b: u32,
    pub to_b: u32,
}

/// An unchanged span in pre-edit coordinates, plus the offset translating
/// it into post-edit coordinates.
#[derive(Debug, Clone, Copy)]
struct UnchangedSpan {
    from: u32,
    to: u32,
    offset: i64,
}

#[derive(Debug)]
struct Candidate {
    tree: Arc<Tree>,
}

/// Reusable subtrees of a previous parse, indexed by post-edit position.
#[derive(Debug)]
pub struct FragmentMap {
    candidates: Vec<Candidate>,
    /// Post-edit start position → candidate indices, largest subtree first.
    by_pos: HashMap<u32, SmallVec<[usize; 2]>, RandomState>,
}

impl FragmentMap {
    /// Build the reuse index from a previous tree and the edits applied
    /// since it was produced. `changes` must be sorted and non-overlapping.
    #[must_use]
    pub fn new(tree: &Arc<Tree>, changes: &[ChangedRange]) -> Self {
        let spans = unchanged_spans(tree.len(), changes);
        let mut map = Self {
            candidates: Vec::new(),
            by_pos: HashMap::with_hasher(RandomState::new()),
        };
        for span in &spans {
            map.collect(tree, 0, span);
        }
        // Probing takes the first acceptable candidate, so order each
        // position's list by subtree size, largest first.
        for indices in map.by_pos.values_mut() {
            indices.sort_by_key(|&i| std::cmp::Reverse(map.candidates[i].tree.len()));
        }
        map
    }

    /// Number of indexed candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// The largest reusable subtree starting at post-edit position `pos`
    /// that `accept` allows (the parser passes a goto check).
    pub(crate) fn best_at(
        &self,
        pos: u32,
        accept: impl Fn(&Arc<Tree>) -> bool,
    ) -> Option<&Arc<Tree>> {
        let indices = self.by_pos.get(&pos)?;
        indices
            .iter()
            .map(|&i| &self.candidates[i].tree)
            .find(|tree| accept(tree))
    }

    fn collect(&mut self, tree: &Arc<Tree>, start: u32, span: &UnchangedSpan) {
        let end = start + tree.len();
        // Nothing inside this subtree can fall in the span.
        if end <= span.from || start >= span.to {
            return;
        }
        if tree.tag().is_some()
            && !tree.is_empty()
            && start >= span.from
            && end <= span.to
            && start + tree.look_ahead() <= span.to
        {
            let new_pos = u32::try_from(i64::from(start) + span.offset).unwrap_or(u32::MAX);
            let index = self.candidates.len();
            self.candidates.push(Candidate {
                tree: Arc::clone(tree),
            });
            self.by_pos.entry(new_pos).or_default().push(index);
        }
        // Descend either way: smaller candidates serve as fallbacks when
        // the parse state has no goto for the larger one.
        for (child, &pos) in tree.children().iter().zip(tree.positions()) {
            if let TreeChild::Node(node) = child {
                self.collect(node, start + pos, span);
            }
        }
    }
}

fn unchanged_spans(old_len: u32, changes: &[ChangedRange]) -> Vec<UnchangedSpan> {
    let mut spans = Vec::with_capacity(changes.len() + 1);
    let mut last_a = 0u32;
    let mut last_b = 0u32;
    for change in changes {
        if change.from_a > last_a {
            spans.push(UnchangedSpan {
                from: last_a,
                to: change.from_a,
                offset: i64::from(last_b) - i64::from(last_a),
            });
        }
        last_a = change.to_a;
        last_b = change.to_b;
    }
    if old_len > last_a {
        spans.push(UnchangedSpan {
            from: last_a,
            to: old_len,
            offset: i64::from(last_b) - i64::from(last_a),
        });
    }
    spans
}
