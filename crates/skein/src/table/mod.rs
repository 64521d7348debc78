//! # Parse Tables
//!
//! Term codes, action encoding, and the read-only state tables the runtime
//! executes. Tables are produced offline by a grammar generator; this module
//! only loads, validates, and queries them. Nothing here is mutated after
//! construction — the parser shares tables behind an `Arc`.
//!
//! ## Term encoding
//!
//! A term is a `u16` naming a terminal or non-terminal. The low bit marks a
//! *tagged* term: one that appears as a node in the output tree. Untagged
//! terms exist only as stack bookkeeping. Two ids are reserved:
//! [`TERM_EOF`] (untagged) and [`TERM_ERR`] (tagged, used for error nodes).
//!
//! ## Action encoding
//!
//! Actions pack into an `i32`:
//!
//! - `0` — no action.
//! - negative — shift; the target state is the absolute value.
//! - positive — reduce; the low [`action::DEPTH_BITS`] bits hold the number
//!   of stack entries consumed, the remaining bits the resulting term.
//! - [`action::ACCEPT`] — top-level acceptance.

pub mod binary;

use crate::error::TableError;
use compact_str::CompactString;
use smallvec::SmallVec;

/// A grammar symbol id. Low bit set means the term is tagged.
pub type Term = u16;

/// End-of-input terminal. Untagged: it never appears in a tree.
pub const TERM_EOF: Term = 0;

/// Error terminal. Tagged: recovery inserts nodes of this term.
pub const TERM_ERR: Term = 1;

/// Sentinel used by the tokenizer for "no token found". Never a valid term.
pub const NO_TERM: Term = u16::MAX;

/// Whether a term produces nodes in the output tree.
#[inline]
#[must_use]
pub const fn term_is_tagged(term: Term) -> bool {
    term & 1 == 1
}

/// Packed action constructors and accessors.
pub mod action {
    use super::Term;

    /// Bits reserved for the reduction depth.
    pub const DEPTH_BITS: u32 = 6;

    /// Mask extracting the reduction depth.
    pub const DEPTH_MASK: i32 = (1 << DEPTH_BITS) - 1;

    /// The distinguished accept action.
    pub const ACCEPT: i32 = i32::MAX;

    /// The "no action" value.
    pub const NONE: i32 = 0;

    #[inline]
    #[must_use]
    pub const fn shift(state: u32) -> i32 {
        -(state as i32)
    }

    #[inline]
    #[must_use]
    pub const fn reduce(depth: u32, term: Term) -> i32 {
        ((term as i32) << DEPTH_BITS) | depth as i32
    }

    #[inline]
    #[must_use]
    pub const fn is_shift(a: i32) -> bool {
        a < 0
    }

    #[inline]
    #[must_use]
    pub const fn is_reduce(a: i32) -> bool {
        a > 0 && a != ACCEPT
    }

    /// Target state of a shift action.
    #[inline]
    #[must_use]
    pub const fn shift_target(a: i32) -> u32 {
        (-a) as u32
    }

    /// Number of stack entries a reduce action consumes.
    #[inline]
    #[must_use]
    pub const fn reduce_depth(a: i32) -> u32 {
        (a & DEPTH_MASK) as u32
    }

    /// Resulting term of a reduce action.
    #[inline]
    #[must_use]
    pub const fn reduce_term(a: i32) -> Term {
        (a >> DEPTH_BITS) as Term
    }
}

/// Sentinel for [`ParseState::always_reduce`]: no unconditional reduce.
pub const NO_ALWAYS_REDUCE: i32 = -1;

/// One immutable LR state. Lookup tables are small sorted pair arrays;
/// duplicate terms in `actions` encode GLR conflicts and make the parser
/// fork.
#[derive(Debug, Clone)]
pub struct ParseState {
    /// `(terminal, action)` pairs sorted by terminal. A terminal may repeat
    /// with different actions (shift/reduce or reduce/reduce conflicts).
    pub actions: Box<[(Term, i32)]>,
    /// `(non-terminal, target state)` pairs sorted by term.
    pub goto: Box<[(Term, u32)]>,
    /// `(terminal, target state)` recovery pairs sorted by term.
    pub recover: Box<[(Term, u32)]>,
    /// Reduce applied unconditionally when the state has no viable shift.
    /// [`NO_ALWAYS_REDUCE`] when absent.
    pub always_reduce: i32,
    /// Reduce applied when the next token matches no action. `0` when absent.
    pub default_reduce: i32,
    /// Tokenizer index used for skip tokens (whitespace, comments), if any.
    pub skip: Option<u32>,
    /// Tokenizers tried in priority order for this state.
    pub tokenizers: SmallVec<[u32; 4]>,
    /// Token group this state belongs to; `1 << token_group` is the mask
    /// used to prune the shared DFA.
    pub token_group: u8,
    /// Whether any action in this state is a shift. Computed at load time;
    /// governs the always-reduce/shift interaction (see [`ParserTables`]).
    pub has_shifts: bool,
}

impl ParseState {
    /// All actions registered for `term`, as a slice of the sorted table.
    #[must_use]
    pub fn actions_for(&self, term: Term) -> &[(Term, i32)] {
        let start = self.actions.partition_point(|&(t, _)| t < term);
        let end = self.actions.partition_point(|&(t, _)| t <= term);
        &self.actions[start..end]
    }

    #[must_use]
    pub fn has_action(&self, term: Term) -> bool {
        !self.actions_for(term).is_empty()
    }

    #[must_use]
    pub fn get_goto(&self, term: Term) -> Option<u32> {
        self.goto
            .binary_search_by_key(&term, |&(t, _)| t)
            .ok()
            .map(|i| self.goto[i].1)
    }

    #[must_use]
    pub fn get_recover(&self, term: Term) -> Option<u32> {
        self.recover
            .binary_search_by_key(&term, |&(t, _)| t)
            .ok()
            .map(|i| self.recover[i].1)
    }

    /// Any reduce this state can perform, used during panic-mode recovery:
    /// the unconditional reduce if present, else the first reduce action.
    /// Returns `0` when the state cannot reduce at all.
    #[must_use]
    pub fn any_reduce(&self) -> i32 {
        if self.always_reduce != NO_ALWAYS_REDUCE {
            return self.always_reduce;
        }
        self.actions
            .iter()
            .map(|&(_, a)| a)
            .find(|&a| action::is_reduce(a))
            .unwrap_or(action::NONE)
    }

    pub(crate) fn compute_has_shifts(&mut self) {
        self.has_shifts = self.actions.iter().any(|&(_, a)| action::is_shift(a));
    }
}

/// How a tokenizer matches characters.
#[derive(Debug, Clone)]
pub enum TokenizerKind {
    /// A packed DFA table shared between token groups.
    Dfa(DfaTable),
    /// A host-provided callback, bound by slot when the [`Parser`] is built.
    ///
    /// [`Parser`]: crate::parser::Parser
    External(u16),
}

/// One tokenizer: the matcher plus the three scheduling flags, stored
/// inline.
#[derive(Debug, Clone)]
pub struct TokenizerDef {
    pub kind: TokenizerKind,
    /// Result depends on parse state; never cached across stacks.
    pub contextual: bool,
    /// Only runs when a higher-priority tokenizer produced a token the
    /// state does not accept.
    pub fallback: bool,
    /// Does not suppress lower-priority tokenizers after matching.
    pub extend: bool,
}

/// A packed tokenizer DFA.
///
/// The word array holds one record per DFA state at its word offset:
///
/// ```text
/// data[s]     group mask of tokens reachable from this state
/// data[s+1]   end of the accepting list (absolute word index)
/// data[s+2]   end of the edge list (absolute word index)
/// data[s+3..acc_end]   accepting (term, mask) pairs
/// data[acc_end..edge_end]   (from, to, target) edges sorted by `from`;
///                           `to == u16::MAX` means unbounded
/// ```
///
/// Edge boundaries are compared against the character's code point clamped
/// to `u16::MAX`; state 0 is the entry state.
#[derive(Debug, Clone)]
pub struct DfaTable {
    pub data: Box<[u16]>,
}

/// A named dialect: the listed terms only match while the dialect is
/// selected on the parser.
#[derive(Debug, Clone)]
pub struct DialectSpec {
    pub name: CompactString,
    pub terms: Box<[Term]>,
}

/// The resolved set of terms the active dialect selection allows.
#[derive(Debug, Clone)]
pub struct Dialect {
    allowed: Box<[u64]>,
}

impl Dialect {
    pub(crate) fn all(max_term: Term) -> Self {
        let words = (usize::from(max_term) + 64) / 64;
        Self {
            allowed: vec![u64::MAX; words.max(1)].into_boxed_slice(),
        }
    }

    pub(crate) fn clear(&mut self, term: Term) {
        let (word, bit) = (usize::from(term) / 64, usize::from(term) % 64);
        if let Some(w) = self.allowed.get_mut(word) {
            *w &= !(1 << bit);
        }
    }

    pub(crate) fn set(&mut self, term: Term) {
        let (word, bit) = (usize::from(term) / 64, usize::from(term) % 64);
        if let Some(w) = self.allowed.get_mut(word) {
            *w |= 1 << bit;
        }
    }

    /// Whether the active dialect selection allows `term` to match.
    #[inline]
    #[must_use]
    pub fn allows(&self, term: Term) -> bool {
        let (word, bit) = (usize::from(term) / 64, usize::from(term) % 64);
        self.allowed.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }
}

/// The complete, immutable table set the runtime executes.
#[derive(Debug, Clone)]
pub struct ParserTables {
    pub states: Box<[ParseState]>,
    pub tokenizers: Box<[TokenizerDef]>,
    /// Node names indexed by term id. Untagged or unused ids hold an empty
    /// string; the array is dense so no string-keyed lookup is needed.
    pub term_names: Box<[CompactString]>,
    pub dialects: Box<[DialectSpec]>,
    /// Highest term id any table entry references.
    pub max_term: Term,
}

impl ParserTables {
    /// Name of a term, for rendering trees. Empty for unnamed terms.
    #[must_use]
    pub fn term_name(&self, term: Term) -> &str {
        self.term_names
            .get(usize::from(term))
            .map_or("", CompactString::as_str)
    }

    /// Build a dialect allowing exactly the selected dialect names (plus
    /// every term not claimed by any dialect).
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownDialect`] for an unrecognized name.
    pub fn dialect(&self, selected: &[&str]) -> Result<Dialect, TableError> {
        for name in selected {
            if !self.dialects.iter().any(|d| d.name == *name) {
                return Err(TableError::UnknownDialect {
                    name: (*name).to_string(),
                });
            }
        }
        let mut dialect = Dialect::all(self.max_term);
        for spec in &self.dialects {
            for &term in &spec.terms {
                dialect.clear(term);
            }
        }
        for spec in &self.dialects {
            if selected.contains(&spec.name.as_str()) {
                for &term in &spec.terms {
                    dialect.set(term);
                }
            }
        }
        Ok(dialect)
    }

    /// Check every cross-reference in the tables. Run once at load; the
    /// parser afterwards trusts shift targets and tokenizer indices.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found, naming the offending state.
    pub fn validate(&self) -> Result<(), TableError> {
        let state_count = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        let tokenizer_count = u32::try_from(self.tokenizers.len()).unwrap_or(u32::MAX);
        for (id, state) in self.states.iter().enumerate() {
            let id = id as u32;
            for &(_, a) in &state.actions {
                if action::is_shift(a) && action::shift_target(a) >= state_count {
                    return Err(TableError::UnknownState {
                        state: action::shift_target(a),
                        count: state_count,
                    });
                }
                if action::is_reduce(a) && action::reduce_term(a) > self.max_term {
                    return Err(TableError::BadAction { state: id, action: a });
                }
            }
            for &(_, target) in state.goto.iter().chain(state.recover.iter()) {
                if target >= state_count {
                    return Err(TableError::UnknownState {
                        state: target,
                        count: state_count,
                    });
                }
            }
            if state.always_reduce != NO_ALWAYS_REDUCE
                && !action::is_reduce(state.always_reduce)
            {
                return Err(TableError::BadAction {
                    state: id,
                    action: state.always_reduce,
                });
            }
            if state.default_reduce != 0 && !action::is_reduce(state.default_reduce) {
                return Err(TableError::BadAction {
                    state: id,
                    action: state.default_reduce,
                });
            }
            for &index in state.skip.iter().chain(state.tokenizers.iter()) {
                if index >= tokenizer_count {
                    return Err(TableError::BadTokenizer {
                        state: id,
                        index,
                        count: tokenizer_count,
                    });
                }
            }
        }
        for (index, def) in self.tokenizers.iter().enumerate() {
            if let TokenizerKind::Dfa(table) = &def.kind {
                validate_dfa(table, index as u32)?;
            }
        }
        Ok(())
    }

    /// Recompute per-state derived flags. Called by loaders after filling
    /// the action tables.
    pub fn finish(&mut self) {
        for state in &mut self.states {
            state.compute_has_shifts();
        }
    }
}

fn validate_dfa(table: &DfaTable, index: u32) -> Result<(), TableError> {
    let data = &table.data;
    if data.is_empty() {
        return Err(TableError::BadDfa {
            index,
            reason: "empty table",
        });
    }
    let mut offsets = vec![0u16];
    let mut seen = hashbrown::HashSet::new();
    while let Some(s) = offsets.pop() {
        if !seen.insert(s) {
            continue;
        }
        let s = usize::from(s);
        if s + 3 > data.len() {
            return Err(TableError::BadDfa {
                index,
                reason: "state header out of range",
            });
        }
        let acc_end = usize::from(data[s + 1]);
        let edge_end = usize::from(data[s + 2]);
        if acc_end < s + 3 || edge_end < acc_end || edge_end > data.len() {
            return Err(TableError::BadDfa {
                index,
                reason: "state bounds out of range",
            });
        }
        if (acc_end - (s + 3)) % 2 != 0 || (edge_end - acc_end) % 3 != 0 {
            return Err(TableError::BadDfa {
                index,
                reason: "misaligned accept or edge list",
            });
        }
        for edge in data[acc_end..edge_end].chunks_exact(3) {
            offsets.push(edge[2]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state() -> ParseState {
        ParseState {
            actions: Box::new([]),
            goto: Box::new([]),
            recover: Box::new([]),
            always_reduce: NO_ALWAYS_REDUCE,
            default_reduce: 0,
            skip: None,
            tokenizers: SmallVec::new(),
            token_group: 0,
            has_shifts: false,
        }
    }

    #[test]
    fn action_round_trips() {
        let a = action::shift(17);
        assert!(action::is_shift(a));
        assert_eq!(action::shift_target(a), 17);

        let r = action::reduce(3, 5);
        assert!(action::is_reduce(r));
        assert_eq!(action::reduce_depth(r), 3);
        assert_eq!(action::reduce_term(r), 5);

        assert!(!action::is_reduce(action::ACCEPT));
        assert!(!action::is_shift(action::ACCEPT));
    }

    #[test]
    fn tagged_terms_are_odd() {
        assert!(term_is_tagged(TERM_ERR));
        assert!(!term_is_tagged(TERM_EOF));
        assert!(term_is_tagged(3));
        assert!(!term_is_tagged(4));
    }

    #[test]
    fn actions_for_returns_conflicting_entries() {
        let mut state = empty_state();
        state.actions = Box::new([
            (2, action::shift(1)),
            (4, action::reduce(1, 3)),
            (4, action::shift(2)),
            (6, action::reduce(2, 3)),
        ]);
        assert_eq!(state.actions_for(4).len(), 2);
        assert_eq!(state.actions_for(2).len(), 1);
        assert!(state.actions_for(8).is_empty());
        assert!(state.has_action(6));
    }

    #[test]
    fn any_reduce_prefers_always_reduce() {
        let mut state = empty_state();
        state.actions = Box::new([(2, action::reduce(1, 3))]);
        assert_eq!(state.any_reduce(), action::reduce(1, 3));
        state.always_reduce = action::reduce(2, 5);
        assert_eq!(state.any_reduce(), action::reduce(2, 5));
    }

    #[test]
    fn dialect_masks_terms() {
        let tables = ParserTables {
            states: Box::new([]),
            tokenizers: Box::new([]),
            term_names: Box::new([]),
            dialects: Box::new([DialectSpec {
                name: "extra".into(),
                terms: Box::new([5]),
            }]),
            max_term: 7,
        };
        let plain = tables.dialect(&[]).unwrap();
        assert!(!plain.allows(5));
        assert!(plain.allows(3));
        let extra = tables.dialect(&["extra"]).unwrap();
        assert!(extra.allows(5));
        assert!(tables.dialect(&["nope"]).is_err());
    }

    #[test]
    fn validate_rejects_bad_shift_target() {
        let mut state = empty_state();
        state.actions = Box::new([(2, action::shift(9))]);
        let tables = ParserTables {
            states: Box::new([state]),
            tokenizers: Box::new([]),
            term_names: Box::new([]),
            dialects: Box::new([]),
            max_term: 7,
        };
        assert!(matches!(
            tables.validate(),
            Err(TableError::UnknownState { state: 9, .. })
        ));
    }

    #[test]
    fn validate_rejects_truncated_dfa() {
        let tables = ParserTables {
            states: Box::new([]),
            tokenizers: Box::new([TokenizerDef {
                kind: TokenizerKind::Dfa(DfaTable {
                    data: vec![1, 3].into_boxed_slice(),
                }),
                contextual: false,
                fallback: false,
                extend: false,
            }]),
            term_names: Box::new([]),
            dialects: Box::new([]),
            max_term: 1,
        };
        assert!(matches!(tables.validate(), Err(TableError::BadDfa { .. })));
    }
}
