//! # Parse Stacks
//!
//! GSS-style stack heads. Frames (state, reduction start, buffer base) live
//! in an append-only arena shared by every head; a head owns only its frame
//! index plus value-semantics working data (node buffer, reused-subtree
//! table, lookahead log) that is cloned on fork. The whole arena is freed
//! when the parse ends, so no per-frame reference counting is needed.
//!
//! The buffer holds in-progress tree nodes in postfix order as
//! `(term, start, end, child_count)` quads. A sentinel term marks entries
//! that stand for whole reused subtrees, with the `count` field indexing
//! the head's side table.

use crate::syntax::TreeChild;
use crate::table::{term_is_tagged, Term, TERM_ERR};
use std::sync::Arc;

/// Sentinel frame id for the bottom of a chain.
pub(crate) const NO_FRAME: u32 = u32::MAX;

/// Buffer entry term marking a reused subtree; `count` holds the index
/// into [`Stack::reused`].
pub(crate) const REUSED_TERM: u32 = u32::MAX;

/// One postfix buffer quad.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferEntry {
    pub term: u32,
    pub start: u32,
    pub end: u32,
    /// Direct child count, or the reused-table index for [`REUSED_TERM`].
    pub count: u32,
}

impl BufferEntry {
    /// Structural child count (reused subtrees are opaque leaves here).
    #[inline]
    pub(crate) fn children(&self) -> u32 {
        if self.term == REUSED_TERM {
            0
        } else {
            self.count
        }
    }
}

/// Index of the first entry of the postfix subtree rooted at `root`.
pub(crate) fn subtree_first(entries: &[BufferEntry], root: usize) -> usize {
    let mut pending = entries[root].children();
    let mut idx = root;
    while pending > 0 {
        idx -= 1;
        pending -= 1;
        pending += entries[idx].children();
    }
    idx
}

/// Number of completed subtree roots in a postfix slice.
pub(crate) fn count_roots(entries: &[BufferEntry]) -> u32 {
    let mut roots = 0;
    let mut i = entries.len();
    while i > 0 {
        i = subtree_first(entries, i - 1);
        roots += 1;
    }
    roots
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub state: u32,
    /// Input position where this frame's subtree begins.
    pub start: u32,
    /// Buffer length when the frame was pushed; a reduction popping down to
    /// this frame takes the entries emitted since as its children.
    pub buf_base: u32,
    pub parent: u32,
    pub depth: u32,
}

/// Append-only frame storage shared by all heads of one parse.
#[derive(Debug, Default)]
pub(crate) struct StackArena {
    frames: Vec<Frame>,
}

impl StackArena {
    pub fn push(&mut self, frame: Frame) -> u32 {
        let id = self.frames.len() as u32;
        self.frames.push(frame);
        id
    }

    #[inline]
    pub fn get(&self, id: u32) -> &Frame {
        &self.frames[id as usize]
    }
}

/// One live parse head.
#[derive(Debug, Clone)]
pub(crate) struct Stack {
    pub state: u32,
    /// Input position, including trailing skipped tokens.
    pub pos: u32,
    /// End of the last non-skip token; reductions end here.
    pub reduce_pos: u32,
    pub score: i32,
    /// Top frame in the arena.
    pub frame: u32,
    pub buffer: Vec<BufferEntry>,
    /// Subtrees shifted wholesale during incremental reuse.
    pub reused: Vec<TreeChild>,
    /// `(token start, lookahead end)` per consumed token, position-sorted.
    pub lookahead: Vec<(u32, u32)>,
    /// Consecutive recovery attempts; reset by a successful shift.
    pub recovering: u32,
}

impl Stack {
    pub fn start(arena: &mut StackArena, state: u32) -> Self {
        let frame = arena.push(Frame {
            state,
            start: 0,
            buf_base: 0,
            parent: NO_FRAME,
            depth: 0,
        });
        Self {
            state,
            pos: 0,
            reduce_pos: 0,
            score: 0,
            frame,
            buffer: Vec::new(),
            reused: Vec::new(),
            lookahead: Vec::new(),
            recovering: 0,
        }
    }

    pub fn depth(&self, arena: &StackArena) -> u32 {
        arena.get(self.frame).depth
    }

    /// Push a shifted terminal and move to `target`.
    pub fn shift(&mut self, arena: &mut StackArena, target: u32, term: Term, start: u32, end: u32) {
        let base = self.buffer.len() as u32;
        if term_is_tagged(term) {
            self.buffer.push(BufferEntry {
                term: u32::from(term),
                start,
                end,
                count: 0,
            });
        }
        let depth = arena.get(self.frame).depth + 1;
        self.frame = arena.push(Frame {
            state: target,
            start,
            buf_base: base,
            parent: self.frame,
            depth,
        });
        self.state = target;
        self.pos = end;
        self.reduce_pos = end;
        self.recovering = 0;
    }

    /// Shift a whole reused subtree in one step.
    pub fn shift_reused(&mut self, arena: &mut StackArena, target: u32, start: u32, tree: &Arc<crate::syntax::Tree>) {
        let end = start + tree.len();
        let base = self.buffer.len() as u32;
        let index = self.reused.len() as u32;
        self.reused.push(TreeChild::Node(Arc::clone(tree)));
        self.buffer.push(BufferEntry {
            term: REUSED_TERM,
            start,
            end,
            count: index,
        });
        self.lookahead.push((start, start + tree.look_ahead()));
        let depth = arena.get(self.frame).depth + 1;
        self.frame = arena.push(Frame {
            state: target,
            start,
            buf_base: base,
            parent: self.frame,
            depth,
        });
        self.state = target;
        self.pos = end;
        self.reduce_pos = end;
        self.recovering = 0;
    }

    /// Append a skipped (trivia) leaf without pushing a frame.
    pub fn skip_leaf(&mut self, term: Term, start: u32, end: u32) {
        if term_is_tagged(term) {
            self.buffer.push(BufferEntry {
                term: u32::from(term),
                start,
                end,
                count: 0,
            });
        }
    }

    /// Append an error leaf covering `[start, end)`.
    pub fn err_leaf(&mut self, start: u32, end: u32) {
        self.buffer.push(BufferEntry {
            term: u32::from(TERM_ERR),
            start,
            end,
            count: 0,
        });
    }

    /// Continue in a recovery state: the top frame's state is replaced so
    /// later reduction depths still line up with the shifted symbols.
    pub fn recover_to(&mut self, arena: &mut StackArena, target: u32) {
        let top = *arena.get(self.frame);
        self.frame = arena.push(Frame {
            state: target,
            ..top
        });
        self.state = target;
    }

    /// The frame exposed after popping `depth` entries, i.e. the one a
    /// reduction's goto is looked up on. `None` when the chain is shorter
    /// than `depth`.
    pub fn frame_below<'a>(&self, arena: &'a StackArena, depth: u32) -> Option<&'a Frame> {
        let mut id = self.frame;
        for _ in 0..depth {
            id = arena.get(id).parent;
            if id == NO_FRAME {
                return None;
            }
        }
        Some(arena.get(id))
    }

    /// Apply a reduction of `depth` entries to `term`, entering `target`.
    pub fn reduce(&mut self, arena: &mut StackArena, depth: u32, term: Term, target: u32) {
        if depth == 0 {
            let base = self.buffer.len() as u32;
            if term_is_tagged(term) {
                self.buffer.push(BufferEntry {
                    term: u32::from(term),
                    start: self.reduce_pos,
                    end: self.reduce_pos,
                    count: 0,
                });
            }
            let parent_depth = arena.get(self.frame).depth;
            self.frame = arena.push(Frame {
                state: target,
                start: self.reduce_pos,
                buf_base: base,
                parent: self.frame,
                depth: parent_depth + 1,
            });
            self.state = target;
            return;
        }

        let base_id = {
            let mut id = self.frame;
            for _ in 1..depth {
                id = arena.get(id).parent;
            }
            id
        };
        let base = *arena.get(base_id);
        if term_is_tagged(term) {
            let count = count_roots(&self.buffer[base.buf_base as usize..]);
            self.buffer.push(BufferEntry {
                term: u32::from(term),
                start: base.start,
                end: self.reduce_pos,
                count,
            });
        }
        let parent_depth = if base.parent == NO_FRAME {
            0
        } else {
            arena.get(base.parent).depth
        };
        self.frame = arena.push(Frame {
            state: target,
            start: base.start,
            buf_base: base.buf_base,
            parent: base.parent,
            depth: parent_depth + 1,
        });
        self.state = target;
    }

    /// Fork for a conflicting action: frames are shared, working data is
    /// copied by value.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Whether two heads carry the same full state chain, which makes them
    /// interchangeable for all future parsing.
    pub fn same_chain(&self, other: &Self, arena: &StackArena) -> bool {
        if self.state != other.state || self.pos != other.pos {
            return false;
        }
        let mut a = self.frame;
        let mut b = other.frame;
        if arena.get(a).depth != arena.get(b).depth {
            return false;
        }
        while a != b {
            if a == NO_FRAME || b == NO_FRAME {
                return a == b;
            }
            let (fa, fb) = (arena.get(a), arena.get(b));
            if fa.state != fb.state {
                return false;
            }
            a = fa.parent;
            b = fb.parent;
        }
        true
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

    #[test]
    fn count_roots_handles_nesting() {
        // Postfix: a, S(a), a  — two roots (S and the trailing a).
        let entries = [
            leaf(3, 0, 1),
            BufferEntry {
                term: 5,
                start: 0,
                end: 1,
                count: 1,
            },
            leaf(3, 1, 2),
        ];
        assert_eq!(count_roots(&entries), 2);
        assert_eq!(subtree_first(&entries, 1), 0);
        assert_eq!(subtree_first(&entries, 2), 2);
    }

    #[test]
    fn shift_then_reduce_builds_quads() {
        let mut arena = StackArena::default();
        let mut stack = Stack::start(&mut arena, 0);
        stack.shift(&mut arena, 1, 3, 0, 1);
        assert_eq!(stack.buffer.len(), 1);
        assert_eq!(stack.depth(&arena), 1);

        stack.reduce(&mut arena, 1, 5, 2);
        assert_eq!(stack.state, 2);
        assert_eq!(stack.depth(&arena), 1);
        let quad = stack.buffer[1];
        assert_eq!((quad.term, quad.start, quad.end, quad.count), (5, 0, 1, 1));
    }

    #[test]
    fn untagged_reduce_emits_no_quad() {
        let mut arena = StackArena::default();
        let mut stack = Stack::start(&mut arena, 0);
        stack.shift(&mut arena, 1, 3, 0, 1);
        stack.reduce(&mut arena, 1, 4, 2);
        // Term 4 is untagged (even), so only the leaf remains.
        assert_eq!(stack.buffer.len(), 1);
        assert_eq!(stack.state, 2);
    }

    #[test]
    fn epsilon_reduce_keeps_position() {
        let mut arena = StackArena::default();
        let mut stack = Stack::start(&mut arena, 0);
        stack.shift(&mut arena, 1, 3, 0, 2);
        stack.reduce(&mut arena, 0, 5, 4);
        let quad = stack.buffer[1];
        assert_eq!((quad.start, quad.end, quad.count), (2, 2, 0));
        assert_eq!(stack.depth(&arena), 2);
    }

    #[test]
    fn forks_share_frames_and_diverge_buffers() {
        let mut arena = StackArena::default();
        let mut stack = Stack::start(&mut arena, 0);
        stack.shift(&mut arena, 1, 3, 0, 1);
        let mut fork = stack.fork();
        assert!(stack.same_chain(&fork, &arena));
        fork.shift(&mut arena, 2, 3, 1, 2);
        assert!(!stack.same_chain(&fork, &arena));
        assert_eq!(stack.buffer.len(), 1);
        assert_eq!(fork.buffer.len(), 2);
    }

    #[test]
    fn skipped_leaves_become_children_of_the_next_reduction() {
        let mut arena = StackArena::default();
        let mut stack = Stack::start(&mut arena, 0);
        stack.shift(&mut arena, 1, 3, 0, 1);
        stack.skip_leaf(7, 1, 2);
        stack.shift(&mut arena, 2, 3, 2, 3);
        stack.reduce(&mut arena, 2, 5, 3);
        let quad = *stack.buffer.last().unwrap();
        assert_eq!((quad.term, quad.count), (5, 3));
    }
}
