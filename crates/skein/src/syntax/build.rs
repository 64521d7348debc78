//! # Tree Assembly
//!
//! Converts a head's postfix quad buffer into the final [`Tree`] /
//! [`TreeBuffer`] structure after acceptance.
//!
//! Runs of adjacent small subtrees flush into packed `TreeBuffer`s (postfix
//! order reversed into prefix order, positions made relative); anything
//! large, sparse, or containing a reused subtree becomes a [`Tree`] with
//! recursively built children. The boundary between the two representations
//! never changes the logical structure.

use crate::parser::stack::{subtree_first, BufferEntry, REUSED_TERM};
use crate::syntax::{Tree, TreeBuffer, TreeChild, BUFFER_NODE_WORDS};
use crate::table::Term;
use std::sync::Arc;

/// Storage-split thresholds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildConfig {
    /// Minimum quads in a run before it is packed into a buffer.
    pub buffer_run_min: usize,
    /// Maximum source span a single buffer may cover (relative positions
    /// must fit in `u16`).
    pub buffer_max_span: u32,
    /// Maximum packed nodes per buffer.
    pub buffer_max_nodes: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            buffer_run_min: 8,
            buffer_max_span: 1024,
            buffer_max_nodes: 256,
        }
    }
}

pub(crate) struct TreeAssembly<'a> {
    entries: &'a [BufferEntry],
    reused: &'a [TreeChild],
    /// `(token start, lookahead end)`, sorted by token start.
    lookahead: &'a [(u32, u32)],
    config: BuildConfig,
}

impl<'a> TreeAssembly<'a> {
    pub fn new(
        entries: &'a [BufferEntry],
        reused: &'a [TreeChild],
        lookahead: &'a [(u32, u32)],
        config: BuildConfig,
    ) -> Self {
        Self {
            entries,
            reused,
            lookahead,
            config,
        }
    }

    /// Assemble the whole buffer into a tree covering `[0, len)`.
    pub fn finish(&self, len: u32) -> Arc<Tree> {
        let roots = self.roots_of(0, self.entries.len());
        let (children, positions, la) = self.build_children(&roots, 0);
        if let [TreeChild::Node(tree)] = children.as_slice() {
            if positions[0] == 0 && tree.len() == len && tree.tag().is_some() {
                return Arc::clone(tree);
            }
        }
        Tree::new(None, len, children, positions, la)
    }

    /// Forward-ordered root indices of the postfix range `[from, to)`.
    fn roots_of(&self, from: usize, to: usize) -> Vec<usize> {
        let mut roots = Vec::new();
        let mut i = to;
        while i > from {
            let first = subtree_first(&self.entries[from..i], i - from - 1) + from;
            roots.push(i - 1);
            i = first;
        }
        roots.reverse();
        roots
    }

    /// Build the children for `roots`, positions relative to `parent_start`.
    /// Returns the children, their positions, and the furthest absolute
    /// lookahead inside them.
    fn build_children(
        &self,
        roots: &[usize],
        parent_start: u32,
    ) -> (Vec<TreeChild>, Vec<u32>, u32) {
        let mut children = Vec::new();
        let mut positions = Vec::new();
        let mut la = 0u32;
        let mut run: Vec<usize> = Vec::new();
        let mut run_quads = 0usize;

        let flush =
            |run: &mut Vec<usize>,
             run_quads: &mut usize,
             children: &mut Vec<TreeChild>,
             positions: &mut Vec<u32>,
             la: &mut u32,
             this: &Self| {
                if run.is_empty() {
                    return;
                }
                if *run_quads >= this.config.buffer_run_min {
                    let (child, start, run_la) = this.pack_buffer(run);
                    children.push(child);
                    positions.push(start - parent_start);
                    *la = (*la).max(run_la);
                } else {
                    for &root in run.iter() {
                        let (child, start, node_la) = this.build_child(root);
                        children.push(child);
                        positions.push(start - parent_start);
                        *la = (*la).max(node_la);
                    }
                }
                run.clear();
                *run_quads = 0;
            };

        for &root in roots {
            let quads = root - subtree_first(self.entries, root) + 1;
            let entry = self.entries[root];
            let small = self.bufferable(root)
                && run_quads + quads <= self.config.buffer_max_nodes
                && run
                    .first()
                    .map_or(true, |&f| entry.end - self.entries[f].start <= self.config.buffer_max_span);
            if small {
                run.push(root);
                run_quads += quads;
            } else {
                flush(&mut run, &mut run_quads, &mut children, &mut positions, &mut la, self);
                let (child, start, node_la) = self.build_child(root);
                children.push(child);
                positions.push(start - parent_start);
                la = la.max(node_la);
            }
        }
        flush(&mut run, &mut run_quads, &mut children, &mut positions, &mut la, self);
        (children, positions, la)
    }

    /// Whether the subtree at `root` may live inside a packed buffer.
    fn bufferable(&self, root: usize) -> bool {
        let first = subtree_first(self.entries, root);
        if root - first + 1 > self.config.buffer_max_nodes {
            return false;
        }
        let entry = self.entries[root];
        if entry.end - entry.start > self.config.buffer_max_span {
            return false;
        }
        self.entries[first..=root]
            .iter()
            .all(|e| e.term != REUSED_TERM)
    }

    /// Build one subtree as a [`Tree`] (or splice the reused subtree).
    fn build_child(&self, root: usize) -> (TreeChild, u32, u32) {
        let entry = self.entries[root];
        if entry.term == REUSED_TERM {
            let child = self.reused[entry.count as usize].clone();
            let la = match &child {
                TreeChild::Node(tree) => entry.start + tree.look_ahead(),
                TreeChild::Buffer(buffer) => entry.start + buffer.len(),
            };
            return (child, entry.start, la);
        }
        let first = subtree_first(self.entries, root);
        let child_roots = self.roots_of(first, root);
        let (children, positions, child_la) = self.build_children(&child_roots, entry.start);
        let la = child_la
            .max(self.lookahead_in(entry.start, entry.end))
            .max(entry.end);
        let tree = Tree::new(
            Some(entry.term as Term),
            entry.end - entry.start,
            children,
            positions,
            la - entry.start,
        );
        (TreeChild::Node(tree), entry.start, la)
    }

    /// Pack a run of subtree roots into one prefix-order buffer.
    fn pack_buffer(&self, run: &[usize]) -> (TreeChild, u32, u32) {
        let run_start = self.entries[*run.first().unwrap()].start;
        let run_end = self.entries[*run.last().unwrap()].end;
        let mut words = Vec::with_capacity(
            run.iter()
                .map(|&r| (r - subtree_first(self.entries, r) + 1) * BUFFER_NODE_WORDS)
                .sum(),
        );
        let mut la = run_end;
        for &root in run {
            self.pack_subtree(root, run_start, &mut words);
            la = la.max(self.lookahead_in(self.entries[root].start, self.entries[root].end));
        }
        let buffer = TreeBuffer::new(words, run_end - run_start);
        (TreeChild::Buffer(buffer), run_start, la)
    }

    fn pack_subtree(&self, root: usize, base: u32, words: &mut Vec<u16>) {
        let entry = self.entries[root];
        words.push(entry.term as u16);
        words.push((entry.start - base) as u16);
        words.push((entry.end - base) as u16);
        words.push(entry.count as u16);
        let first = subtree_first(self.entries, root);
        for child in self.roots_of(first, root) {
            self.pack_subtree(child, base, words);
        }
    }

    /// Furthest lookahead of any token starting in `[start, end)`.
    fn lookahead_in(&self, start: u32, end: u32) -> u32 {
        let lo = self.lookahead.partition_point(|&(p, _)| p < start);
        let hi = self.lookahead.partition_point(|&(p, _)| p < end);
        self.lookahead[lo..hi]
            .iter()
            .map(|&(_, la)| la)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(term: u32, start: u32, end: u32) -> BufferEntry {
        BufferEntry {
            term,
            start,
            end,
            count: 0,
        }
    }

    fn node(term: u32, start: u32, end: u32, count: u32) -> BufferEntry {
        BufferEntry {
            term,
            start,
            end,
            count,
        }
    }

    // Postfix buffer for S(a,a,a) over "aaa".
    fn aaa() -> Vec<BufferEntry> {
        vec![
            leaf(3, 0, 1),
            leaf(3, 1, 2),
            leaf(3, 2, 3),
            node(5, 0, 3, 3),
        ]
    }

    #[test]
    fn single_named_root_is_unwrapped() {
        let entries = aaa();
        let assembly = TreeAssembly::new(&entries, &[], &[], BuildConfig::default());
        let tree = assembly.finish(3);
        assert_eq!(tree.tag(), Some(5));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn representation_split_is_invisible() {
        let entries = aaa();
        let as_trees = TreeAssembly::new(
            &entries,
            &[],
            &[],
            BuildConfig {
                buffer_run_min: usize::MAX,
                ..BuildConfig::default()
            },
        )
        .finish(3);
        let as_buffers = TreeAssembly::new(
            &entries,
            &[],
            &[],
            BuildConfig {
                buffer_run_min: 1,
                ..BuildConfig::default()
            },
        )
        .finish(3);
        let tables = crate::table::ParserTables {
            states: Box::new([]),
            tokenizers: Box::new([]),
            term_names: vec!["", "", "", "a", "", "S"]
                .into_iter()
                .map(Into::into)
                .collect(),
            dialects: Box::new([]),
            max_term: 5,
        };
        assert_eq!(as_trees.to_sexpr(&tables), as_buffers.to_sexpr(&tables));
    }

    #[test]
    fn lookahead_propagates_to_nodes() {
        let entries = aaa();
        let log = [(0, 1), (1, 2), (2, 5)];
        let assembly = TreeAssembly::new(
            &entries,
            &[],
            &log,
            BuildConfig {
                buffer_run_min: usize::MAX,
                ..BuildConfig::default()
            },
        );
        let tree = assembly.finish(3);
        assert_eq!(tree.look_ahead(), 5);
    }

    #[test]
    fn multiple_roots_get_a_container() {
        let entries = vec![leaf(3, 0, 1), leaf(1, 1, 2)];
        let assembly = TreeAssembly::new(
            &entries,
            &[],
            &[],
            BuildConfig {
                buffer_run_min: usize::MAX,
                ..BuildConfig::default()
            },
        );
        let tree = assembly.finish(2);
        assert_eq!(tree.tag(), None);
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.positions(), &[0, 1]);
    }
}
