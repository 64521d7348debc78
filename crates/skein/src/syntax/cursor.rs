//! # Cursor API
//!
//! Positional resolution and document-order traversal over the dual
//! [`Tree`] / [`TreeBuffer`] representation. A cursor keeps a stack of
//! frames — one variant per representation — so consumers never see which
//! storage a node landed in.
//!
//! Iteration visits tagged nodes in document order; the untagged container
//! a parse may wrap around multiple roots is only ever surfaced as the
//! cursor's starting point, with [`TreeCursor::tag`] returning `None`.

use crate::syntax::{Tree, TreeBuffer, TreeChild};
use crate::table::Term;
use smallvec::SmallVec;

#[derive(Clone)]
enum CursorFrame<'a> {
    Node {
        tree: &'a Tree,
        /// Absolute start of this node.
        start: u32,
        /// Index of this node in its parent's child list.
        child_index: usize,
    },
    Buf {
        buffer: &'a TreeBuffer,
        /// Absolute position the buffer's relative offsets are based on.
        base: u32,
        /// Index of the buffer in its parent's child list.
        child_index: usize,
        /// Current packed node.
        node: usize,
        /// Packed ancestors of `node` inside the buffer.
        parents: SmallVec<[usize; 8]>,
    },
}

/// A stateful cursor over a syntax tree.
#[derive(Clone)]
pub struct TreeCursor<'a> {
    frames: SmallVec<[CursorFrame<'a>; 16]>,
}

impl<'a> TreeCursor<'a> {
    /// A cursor positioned at the root of `tree`.
    #[must_use]
    pub fn new(tree: &'a Tree) -> Self {
        let mut frames = SmallVec::new();
        frames.push(CursorFrame::Node {
            tree,
            start: 0,
            child_index: 0,
        });
        Self { frames }
    }

    /// Tag of the current node; `None` only for an untagged container root.
    #[must_use]
    pub fn tag(&self) -> Option<Term> {
        match self.top() {
            CursorFrame::Node { tree, .. } => tree.tag(),
            CursorFrame::Buf { buffer, node, .. } => Some(buffer.node(*node).0),
        }
    }

    /// Absolute start of the current node.
    #[must_use]
    pub fn start(&self) -> u32 {
        match self.top() {
            CursorFrame::Node { start, .. } => *start,
            CursorFrame::Buf {
                buffer, base, node, ..
            } => base + buffer.node(*node).1,
        }
    }

    /// Absolute end of the current node.
    #[must_use]
    pub fn end(&self) -> u32 {
        match self.top() {
            CursorFrame::Node { tree, start, .. } => start + tree.len(),
            CursorFrame::Buf {
                buffer, base, node, ..
            } => base + buffer.node(*node).2,
        }
    }

    /// Move to the first child. Returns `false` (cursor unchanged) on a
    /// leaf.
    pub fn goto_first_child(&mut self) -> bool {
        match self.top_mut() {
            CursorFrame::Buf {
                buffer,
                node,
                parents,
                ..
            } => {
                if buffer.node(*node).3 == 0 {
                    return false;
                }
                parents.push(*node);
                *node += 1;
                true
            }
            CursorFrame::Node { tree, start, .. } => {
                let (tree, start) = (*tree, *start);
                if tree.children().is_empty() {
                    return false;
                }
                let frame = Self::child_frame(tree, start, 0);
                self.frames.push(frame);
                true
            }
        }
    }

    /// Move to the next sibling in document order. Returns `false` (cursor
    /// unchanged) on the last child.
    pub fn goto_next_sibling(&mut self) -> bool {
        match self.top_mut() {
            CursorFrame::Buf {
                buffer,
                node,
                parents,
                child_index,
                ..
            } => {
                let next = buffer.subtree_end(*node);
                let bound = parents
                    .last()
                    .map_or(buffer.node_count(), |&p| buffer.subtree_end(p));
                if next < bound {
                    *node = next;
                    return true;
                }
                if !parents.is_empty() {
                    return false;
                }
                // Past the last packed root: continue with the parent
                // tree's next child.
                let child_index = *child_index;
                self.sibling_in_parent(child_index)
            }
            CursorFrame::Node { child_index, .. } => {
                let child_index = *child_index;
                if self.frames.len() == 1 {
                    return false;
                }
                self.sibling_in_parent(child_index)
            }
        }
    }

    /// Move to the parent node. Returns `false` at the root.
    pub fn goto_parent(&mut self) -> bool {
        if let CursorFrame::Buf { node, parents, .. } = self.top_mut() {
            if let Some(parent) = parents.pop() {
                *node = parent;
                return true;
            }
        }
        if self.frames.len() == 1 {
            return false;
        }
        self.frames.pop();
        true
    }

    /// Move to the next tagged node in document order (preorder). Returns
    /// `false` (cursor at its old position) when the traversal is done.
    pub fn next_node(&mut self) -> bool {
        if self.goto_first_child() {
            return true;
        }
        let checkpoint = self.clone();
        loop {
            if self.goto_next_sibling() {
                return true;
            }
            if !self.goto_parent() {
                *self = checkpoint;
                return false;
            }
        }
    }

    /// Descend to the innermost tagged node containing `pos`.
    pub fn move_to(&mut self, pos: u32) {
        while self.descend_to(pos) {}
    }

    fn top(&self) -> &CursorFrame<'a> {
        self.frames.last().expect("cursor has a root frame")
    }

    fn top_mut(&mut self) -> &mut CursorFrame<'a> {
        self.frames.last_mut().expect("cursor has a root frame")
    }

    fn child_frame(tree: &'a Tree, start: u32, index: usize) -> CursorFrame<'a> {
        let offset = start + tree.positions()[index];
        match &tree.children()[index] {
            TreeChild::Node(child) => CursorFrame::Node {
                tree: child,
                start: offset,
                child_index: index,
            },
            TreeChild::Buffer(buffer) => CursorFrame::Buf {
                buffer,
                base: offset,
                child_index: index,
                node: 0,
                parents: SmallVec::new(),
            },
        }
    }

    /// Replace the top frame with the parent's child at `index + 1`, if any.
    fn sibling_in_parent(&mut self, index: usize) -> bool {
        let parent = &self.frames[self.frames.len() - 2];
        let CursorFrame::Node { tree, start, .. } = parent else {
            // Buffers never nest trees, so a frame's parent is always a node.
            unreachable!("buffer frames only occur below node frames");
        };
        let (tree, start) = (*tree, *start);
        if index + 1 >= tree.children().len() {
            return false;
        }
        let frame = Self::child_frame(tree, start, index + 1);
        *self.frames.last_mut().unwrap() = frame;
        true
    }

    /// One step of positional descent: move into the child containing
    /// `pos`, if there is one.
    fn descend_to(&mut self, pos: u32) -> bool {
        match self.top_mut() {
            CursorFrame::Buf {
                buffer,
                base,
                node,
                parents,
                ..
            } => {
                let mut at = *node + 1;
                let end = buffer.subtree_end(*node);
                while at < end {
                    let (_, from, to, _) = buffer.node(at);
                    if *base + from <= pos && pos < *base + to {
                        parents.push(*node);
                        *node = at;
                        return true;
                    }
                    at = buffer.subtree_end(at);
                }
                false
            }
            CursorFrame::Node { tree, start, .. } => {
                let (tree, start) = (*tree, *start);
                for index in 0..tree.children().len() {
                    let from = start + tree.positions()[index];
                    let child = &tree.children()[index];
                    if from <= pos && pos < from + child.len() {
                        match child {
                            TreeChild::Node(_) => {
                                let frame = Self::child_frame(tree, start, index);
                                self.frames.push(frame);
                                return true;
                            }
                            TreeChild::Buffer(buffer) => {
                                // Enter the packed root containing `pos`.
                                let mut at = 0;
                                while at < buffer.node_count() {
                                    let (_, nfrom, nto, _) = buffer.node(at);
                                    if from + nfrom <= pos && pos < from + nto {
                                        self.frames.push(CursorFrame::Buf {
                                            buffer,
                                            base: from,
                                            child_index: index,
                                            node: at,
                                            parents: SmallVec::new(),
                                        });
                                        return true;
                                    }
                                    at = buffer.subtree_end(at);
                                }
                                return false;
                            }
                        }
                    }
                }
                false
            }
        }
    }
}

impl Tree {
    /// A cursor positioned at the innermost tagged node containing `pos`.
    #[must_use]
    pub fn resolve(&self, pos: u32) -> TreeCursor<'_> {
        let mut cursor = TreeCursor::new(self);
        cursor.move_to(pos);
        cursor
    }

    /// A cursor at this tree's root.
    #[must_use]
    pub fn cursor(&self) -> TreeCursor<'_> {
        TreeCursor::new(self)
    }
}
