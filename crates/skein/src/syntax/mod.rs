//! # Syntax Trees
//!
//! The output of a parse, in two cooperating representations:
//!
//! - [`Tree`]: a node with parallel `children` / `positions` arrays
//!   (positions relative to the node's start). A tree with a tag is a named
//!   node; a tagless tree is a headerless container used for the top level
//!   when the parse did not reduce to a single named root.
//! - [`TreeBuffer`]: a packed `u16` array of `(tag, rel_start, rel_end,
//!   child_count)` quads in prefix order, used for dense runs of small
//!   nodes.
//!
//! Which representation a subtree lands in is a storage decision only; the
//! logical structure is identical either way, and [`cursor`] hides the
//! split from consumers. Trees are immutable once built and shared with
//! `Arc`, so incremental reuse can splice whole subtrees into a new parse
//! by reference.

pub mod cursor;

pub(crate) mod build;

use crate::table::{ParserTables, Term};
use std::fmt::Write as _;
use std::sync::Arc;

/// Number of `u16` words per packed buffer node.
pub const BUFFER_NODE_WORDS: usize = 4;

/// One child of a [`Tree`].
#[derive(Debug, Clone)]
pub enum TreeChild {
    Node(Arc<Tree>),
    Buffer(Arc<TreeBuffer>),
}

impl TreeChild {
    /// Length of source text this child covers.
    #[must_use]
    pub fn len(&self) -> u32 {
        match self {
            Self::Node(tree) => tree.len(),
            Self::Buffer(buffer) => buffer.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A syntax tree node (or headerless container when `tag` is `None`).
#[derive(Debug)]
pub struct Tree {
    tag: Option<Term>,
    len: u32,
    children: Box<[TreeChild]>,
    /// Start of each child relative to this node's start; non-decreasing.
    positions: Box<[u32]>,
    /// Furthest offset (relative to this node's start) inspected while
    /// parsing the node; at least `len`. Governs incremental reuse.
    look_ahead: u32,
}

impl Tree {
    #[must_use]
    pub fn new(
        tag: Option<Term>,
        len: u32,
        children: Vec<TreeChild>,
        positions: Vec<u32>,
        look_ahead: u32,
    ) -> Arc<Self> {
        debug_assert_eq!(children.len(), positions.len());
        Arc::new(Self {
            tag,
            len,
            children: children.into_boxed_slice(),
            positions: positions.into_boxed_slice(),
            look_ahead: look_ahead.max(len),
        })
    }

    /// An empty container tree.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::new(None, 0, Vec::new(), Vec::new(), 0)
    }

    #[inline]
    #[must_use]
    pub const fn tag(&self) -> Option<Term> {
        self.tag
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[TreeChild] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    #[inline]
    #[must_use]
    pub const fn look_ahead(&self) -> u32 {
        self.look_ahead
    }

    /// Render the tagged-node structure as an S-expression, using the term
    /// names from `tables`. Meant for tests and debugging.
    #[must_use]
    pub fn to_sexpr(&self, tables: &ParserTables) -> String {
        let mut out = String::new();
        let mut first = true;
        if let Some(tag) = self.tag {
            out.push_str(tables.term_name(tag));
            if self.children.is_empty() {
                return out;
            }
            out.push('(');
        }
        for child in self.children.iter() {
            if !first {
                out.push(',');
            }
            first = false;
            match child {
                TreeChild::Node(tree) => out.push_str(&tree.to_sexpr(tables)),
                TreeChild::Buffer(buffer) => {
                    buffer.write_sexpr(0, buffer.node_count(), tables, &mut out);
                }
            }
        }
        if self.tag.is_some() {
            out.push(')');
        }
        out
    }
}

/// A packed run of small nodes: `(tag, rel_start, rel_end, child_count)`
/// quads in prefix order, positions relative to the buffer's start. Buffers
/// are atomic for incremental reuse — an edit touching any part discards
/// the whole buffer.
#[derive(Debug)]
pub struct TreeBuffer {
    buffer: Box<[u16]>,
    len: u32,
}

impl TreeBuffer {
    #[must_use]
    pub fn new(buffer: Vec<u16>, len: u32) -> Arc<Self> {
        debug_assert_eq!(buffer.len() % BUFFER_NODE_WORDS, 0);
        Arc::new(Self {
            buffer: buffer.into_boxed_slice(),
            len,
        })
    }

    /// Length of source text the buffer covers.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw quad storage.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.buffer
    }

    /// Number of packed nodes.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.buffer.len() / BUFFER_NODE_WORDS
    }

    /// The quad at node index `index`.
    #[inline]
    #[must_use]
    pub fn node(&self, index: usize) -> (Term, u32, u32, u32) {
        let w = index * BUFFER_NODE_WORDS;
        (
            self.buffer[w],
            u32::from(self.buffer[w + 1]),
            u32::from(self.buffer[w + 2]),
            u32::from(self.buffer[w + 3]),
        )
    }

    /// Node index just past the subtree rooted at `index`.
    #[must_use]
    pub fn subtree_end(&self, index: usize) -> usize {
        let mut pending = 1u32;
        let mut at = index;
        while pending > 0 {
            pending -= 1;
            pending += self.node(at).3;
            at += 1;
        }
        at
    }

    fn write_sexpr(&self, from: usize, to: usize, tables: &ParserTables, out: &mut String) {
        let mut at = from;
        let mut first = true;
        while at < to {
            if !first {
                out.push(',');
            }
            first = false;
            let (tag, _, _, count) = self.node(at);
            let _ = write!(out, "{}", tables.term_name(tag));
            let end = self.subtree_end(at);
            if count > 0 {
                out.push('(');
                self.write_sexpr(at + 1, end, tables, out);
                out.push(')');
            }
            at = end;
        }
    }
}
