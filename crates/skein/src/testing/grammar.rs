//! # Test Grammar Builder
//!
//! A minimal SLR(1) table generator standing in for the offline grammar
//! generator during tests and benches. It builds the LR(0) automaton,
//! computes FOLLOW sets, and keeps every conflicting action in the tables —
//! conflicts are what make the GLR runtime fork, so ambiguous grammars are
//! first-class here.
//!
//! Token patterns (literals and character classes) compile to the packed
//! group-DFA format the runtime executes. Overlapping token patterns are
//! rejected; the generator this stands in for resolves such conflicts with
//! precedence declarations, which tests do not need.

use crate::parser::Parser;
use crate::table::{
    action, DfaTable, DialectSpec, ParseState, ParserTables, Term, TokenizerDef, TokenizerKind,
    NO_ALWAYS_REDUCE, TERM_EOF,
};
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::smallvec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("token {0:?} overlaps an existing token pattern")]
    TokenConflict(String),

    #[error("rule for {0:?} has more than 63 symbols")]
    RuleTooLong(String),

    #[error("non-terminal {0:?} has no rules")]
    MissingRules(String),

    #[error("character {0:?} does not fit the packed DFA tables")]
    UnsupportedChar(char),
}

/// Handle for a declared terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenId(usize);

/// Handle for a declared non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtId(usize);

/// A grammar symbol reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Token(TokenId),
    Nt(NtId),
}

impl From<TokenId> for Symbol {
    fn from(id: TokenId) -> Self {
        Self::Token(id)
    }
}

impl From<NtId> for Symbol {
    fn from(id: NtId) -> Self {
        Self::Nt(id)
    }
}

/// How a terminal matches characters.
#[derive(Debug, Clone)]
pub enum TokenPattern {
    Literal(String),
    Class {
        /// Inclusive character ranges.
        ranges: Vec<(char, char)>,
        /// Match one or more instead of exactly one.
        repeat: bool,
    },
}

impl TokenPattern {
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self::Literal(text.to_string())
    }

    #[must_use]
    pub fn class(ranges: &[(char, char)], repeat: bool) -> Self {
        Self::Class {
            ranges: ranges.to_vec(),
            repeat,
        }
    }
}

struct TokenDef {
    name: CompactString,
    pattern: TokenPattern,
    tagged: bool,
}

struct NtDef {
    name: CompactString,
    tagged: bool,
}

struct RuleDef {
    lhs: usize,
    rhs: Vec<Symbol>,
}

/// Builder for a complete test grammar: terminals, rules, skip tokens, and
/// dialect assignments.
#[derive(Default)]
pub struct GrammarBuilder {
    tokens: Vec<TokenDef>,
    nts: Vec<NtDef>,
    rules: Vec<RuleDef>,
    skip: Option<TokenDef>,
    dialects: Vec<(CompactString, Vec<TokenId>)>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a tagged terminal.
    pub fn token(&mut self, name: &str, pattern: TokenPattern) -> TokenId {
        self.tokens.push(TokenDef {
            name: name.into(),
            pattern,
            tagged: true,
        });
        TokenId(self.tokens.len() - 1)
    }

    /// Declare a tagged non-terminal.
    pub fn nonterminal(&mut self, name: &str) -> NtId {
        self.nts.push(NtDef {
            name: name.into(),
            tagged: true,
        });
        NtId(self.nts.len() - 1)
    }

    /// Declare an untagged helper non-terminal (repeat groupings and the
    /// like; never appears in the tree).
    pub fn hidden_nonterminal(&mut self, name: &str) -> NtId {
        self.nts.push(NtDef {
            name: name.into(),
            tagged: false,
        });
        NtId(self.nts.len() - 1)
    }

    pub fn rule(&mut self, lhs: NtId, rhs: Vec<Symbol>) {
        self.rules.push(RuleDef { lhs: lhs.0, rhs });
    }

    /// Install an untagged skip tokenizer (whitespace).
    pub fn skip(&mut self, pattern: TokenPattern) {
        self.skip = Some(TokenDef {
            name: "skip".into(),
            pattern,
            tagged: false,
        });
    }

    /// Install a tagged skip tokenizer (comments that stay in the tree).
    pub fn tagged_skip(&mut self, name: &str, pattern: TokenPattern) {
        self.skip = Some(TokenDef {
            name: name.into(),
            pattern,
            tagged: true,
        });
    }

    /// Restrict the listed tokens to a named dialect.
    pub fn dialect(&mut self, name: &str, tokens: &[TokenId]) {
        self.dialects.push((name.into(), tokens.to_vec()));
    }

    /// Generate the runtime tables with `start` as the entry point.
    ///
    /// # Errors
    ///
    /// Pattern conflicts, over-long rules, or non-terminals without rules.
    pub fn build(self, start: NtId) -> Result<BuiltGrammar, GrammarError> {
        Generator::new(self)?.run(start)
    }
}

/// Generated tables plus a name → term lookup for assertions.
pub struct BuiltGrammar {
    pub tables: ParserTables,
    terms: HashMap<CompactString, Term, ahash::RandomState>,
}

impl BuiltGrammar {
    /// Term id of a declared token or non-terminal.
    ///
    /// # Panics
    ///
    /// Panics on unknown names; tests want loud failures.
    #[must_use]
    pub fn term(&self, name: &str) -> Term {
        self.terms[name]
    }

    /// A parser over a clone of the generated tables.
    ///
    /// # Panics
    ///
    /// Generated tables always validate; a panic here is a generator bug.
    #[must_use]
    pub fn parser(&self) -> Parser {
        Parser::new(self.tables.clone()).expect("generated tables validate")
    }
}

// ---------------------------------------------------------------------------
// Term assignment and DFA construction
// ---------------------------------------------------------------------------

struct Generator {
    builder: GrammarBuilder,
    token_terms: Vec<Term>,
    nt_terms: Vec<Term>,
    skip_term: Option<Term>,
    names: Vec<CompactString>,
    max_term: Term,
}

impl Generator {
    fn new(builder: GrammarBuilder) -> Result<Self, GrammarError> {
        let mut next_tagged: Term = 3;
        let mut next_untagged: Term = 2;
        let mut assign = |tagged: bool| {
            if tagged {
                let t = next_tagged;
                next_tagged += 2;
                t
            } else {
                let t = next_untagged;
                next_untagged += 2;
                t
            }
        };
        let token_terms: Vec<Term> = builder.tokens.iter().map(|t| assign(t.tagged)).collect();
        let nt_terms: Vec<Term> = builder.nts.iter().map(|n| assign(n.tagged)).collect();
        let skip_term = builder.skip.as_ref().map(|s| assign(s.tagged));
        let max_term = next_tagged.max(next_untagged) - 2;

        let mut names = vec![CompactString::default(); usize::from(max_term) + 1];
        names[usize::from(crate::table::TERM_ERR)] = "ERR".into();
        for (def, &term) in builder.tokens.iter().zip(&token_terms) {
            names[usize::from(term)] = def.name.clone();
        }
        for (def, &term) in builder.nts.iter().zip(&nt_terms) {
            names[usize::from(term)] = def.name.clone();
        }
        if let (Some(def), Some(term)) = (builder.skip.as_ref(), skip_term) {
            names[usize::from(term)] = def.name.clone();
        }

        Ok(Self {
            builder,
            token_terms,
            nt_terms,
            skip_term,
            names,
            max_term,
        })
    }

    fn run(self, start: NtId) -> Result<BuiltGrammar, GrammarError> {
        for (i, nt) in self.builder.nts.iter().enumerate() {
            if !self.builder.rules.iter().any(|r| r.lhs == i) {
                return Err(GrammarError::MissingRules(nt.name.to_string()));
            }
        }

        let mut main_dfa = DfaBuilder::default();
        for (def, &term) in self.builder.tokens.iter().zip(&self.token_terms) {
            main_dfa.add(&def.pattern, term, &def.name)?;
        }
        let skip_dfa = match (&self.builder.skip, self.skip_term) {
            (Some(def), Some(term)) => {
                let mut dfa = DfaBuilder::default();
                dfa.add(&def.pattern, term, &def.name)?;
                Some(dfa.pack())
            }
            _ => None,
        };

        let mut tokenizers = vec![TokenizerDef {
            kind: TokenizerKind::Dfa(main_dfa.pack()),
            contextual: false,
            fallback: false,
            extend: false,
        }];
        let skip_index = skip_dfa.map(|dfa| {
            tokenizers.push(TokenizerDef {
                kind: TokenizerKind::Dfa(dfa),
                contextual: false,
                fallback: false,
                extend: false,
            });
            (tokenizers.len() - 1) as u32
        });

        let states = self.lr_states(start)?;

        let dialects = self
            .builder
            .dialects
            .iter()
            .map(|(name, tokens)| DialectSpec {
                name: name.clone(),
                terms: tokens.iter().map(|t| self.token_terms[t.0]).collect(),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let mut terms: HashMap<CompactString, Term, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        for (def, &term) in self.builder.tokens.iter().zip(&self.token_terms) {
            terms.insert(def.name.clone(), term);
        }
        for (def, &term) in self.builder.nts.iter().zip(&self.nt_terms) {
            terms.insert(def.name.clone(), term);
        }

        let mut tables = ParserTables {
            states: states
                .into_iter()
                .map(|mut s| {
                    s.skip = skip_index;
                    s
                })
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            tokenizers: tokenizers.into_boxed_slice(),
            term_names: self.names.into_boxed_slice(),
            dialects,
            max_term: self.max_term,
        };
        tables.finish();
        Ok(BuiltGrammar { tables, terms })
    }

    // -- SLR(1) construction ------------------------------------------------

    /// Symbols are coded as `0..T` terminals, `T..T+N` non-terminals, with
    /// the augmented start as non-terminal index `N`.
    fn lr_states(&self, start: NtId) -> Result<Vec<ParseState>, GrammarError> {
        let t_count = self.builder.tokens.len();
        let n_count = self.builder.nts.len();
        let aug = n_count;

        // Rule 0 is the augmented start rule.
        let mut rules: Vec<(usize, Vec<usize>)> = vec![(aug, vec![t_count + start.0])];
        for rule in &self.builder.rules {
            if rule.rhs.len() > 63 {
                return Err(GrammarError::RuleTooLong(
                    self.builder.nts[rule.lhs].name.to_string(),
                ));
            }
            let rhs = rule
                .rhs
                .iter()
                .map(|s| match s {
                    Symbol::Token(t) => t.0,
                    Symbol::Nt(n) => t_count + n.0,
                })
                .collect();
            rules.push((rule.lhs, rhs));
        }

        let rules_of = |nt: usize| -> Vec<usize> {
            rules
                .iter()
                .enumerate()
                .filter(|(_, (lhs, _))| *lhs == nt)
                .map(|(i, _)| i)
                .collect()
        };

        // LR(0) item-set collection.
        type Item = (usize, usize);
        let closure = |kernel: &[Item]| -> Vec<Item> {
            let mut set: Vec<Item> = kernel.to_vec();
            let mut i = 0;
            while i < set.len() {
                let (rule, dot) = set[i];
                i += 1;
                if let Some(&sym) = rules[rule].1.get(dot) {
                    if sym >= t_count {
                        for r in rules_of(sym - t_count) {
                            if !set.contains(&(r, 0)) {
                                set.push((r, 0));
                            }
                        }
                    }
                }
            }
            set.sort_unstable();
            set
        };

        let mut sets: Vec<Vec<Item>> = vec![closure(&[(0, 0)])];
        let mut index: HashMap<Vec<Item>, usize, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        index.insert(sets[0].clone(), 0);
        // (from set, symbol) -> target set
        let mut transitions: HashMap<(usize, usize), usize, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());

        let mut at = 0;
        while at < sets.len() {
            let set = sets[at].clone();
            let mut by_symbol: Vec<(usize, Vec<Item>)> = Vec::new();
            for &(rule, dot) in &set {
                if let Some(&sym) = rules[rule].1.get(dot) {
                    match by_symbol.iter_mut().find(|(s, _)| *s == sym) {
                        Some((_, kernel)) => kernel.push((rule, dot + 1)),
                        None => by_symbol.push((sym, vec![(rule, dot + 1)])),
                    }
                }
            }
            by_symbol.sort_by_key(|&(sym, _)| sym);
            for (sym, kernel) in by_symbol {
                let next = closure(&kernel);
                let target = match index.get(&next) {
                    Some(&existing) => existing,
                    None => {
                        sets.push(next.clone());
                        index.insert(next, sets.len() - 1);
                        sets.len() - 1
                    }
                };
                transitions.insert((at, sym), target);
            }
            at += 1;
        }

        let follow = self.follow_sets(&rules, t_count, n_count);

        // Emit runtime states.
        let mut states = Vec::with_capacity(sets.len());
        for (id, set) in sets.iter().enumerate() {
            let mut actions: Vec<(Term, i32)> = Vec::new();
            let mut goto: Vec<(Term, u32)> = Vec::new();
            for t in 0..t_count {
                if let Some(&target) = transitions.get(&(id, t)) {
                    actions.push((self.token_terms[t], action::shift(target as u32)));
                }
            }
            for n in 0..n_count {
                if let Some(&target) = transitions.get(&(id, t_count + n)) {
                    goto.push((self.nt_terms[n], target as u32));
                }
            }
            for &(rule, dot) in set {
                let (lhs, rhs) = &rules[rule];
                if dot < rhs.len() {
                    continue;
                }
                if rule == 0 {
                    actions.push((TERM_EOF, action::ACCEPT));
                    continue;
                }
                let reduce = action::reduce(rhs.len() as u32, self.nt_terms[*lhs]);
                for &t in &follow[*lhs] {
                    let term = if t == t_count {
                        TERM_EOF
                    } else {
                        self.token_terms[t]
                    };
                    actions.push((term, reduce));
                }
            }
            actions.sort_unstable();
            actions.dedup();
            goto.sort_unstable();

            let has_shift = actions.iter().any(|&(_, a)| action::is_shift(a));
            let has_accept = actions.iter().any(|&(_, a)| a == action::ACCEPT);
            let mut distinct_reduces =
                actions.iter().map(|&(_, a)| a).filter(|&a| action::is_reduce(a));
            let always_reduce = match (has_shift, has_accept, distinct_reduces.next()) {
                (false, false, Some(first))
                    if actions
                        .iter()
                        .all(|&(_, a)| a == first) =>
                {
                    first
                }
                _ => NO_ALWAYS_REDUCE,
            };

            states.push(ParseState {
                actions: actions.into_boxed_slice(),
                goto: goto.into_boxed_slice(),
                recover: Box::new([]),
                always_reduce,
                default_reduce: 0,
                skip: None,
                tokenizers: smallvec![0],
                token_group: 0,
                has_shifts: false,
            });
        }
        Ok(states)
    }

    /// FOLLOW sets per non-terminal, with `t_count` standing in for EOF.
    fn follow_sets(
        &self,
        rules: &[(usize, Vec<usize>)],
        t_count: usize,
        n_count: usize,
    ) -> Vec<Vec<usize>> {
        // FIRST and nullability per non-terminal.
        let mut first: Vec<Vec<usize>> = vec![Vec::new(); n_count + 1];
        let mut nullable = vec![false; n_count + 1];
        let mut changed = true;
        while changed {
            changed = false;
            for (lhs, rhs) in rules {
                let mut all_nullable = true;
                for &sym in rhs {
                    if sym < t_count {
                        if !first[*lhs].contains(&sym) {
                            first[*lhs].push(sym);
                            changed = true;
                        }
                        all_nullable = false;
                        break;
                    }
                    let nt = sym - t_count;
                    let add: Vec<usize> = first[nt].clone();
                    for t in add {
                        if !first[*lhs].contains(&t) {
                            first[*lhs].push(t);
                            changed = true;
                        }
                    }
                    if !nullable[nt] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[*lhs] {
                    nullable[*lhs] = true;
                    changed = true;
                }
            }
        }

        let mut follow: Vec<Vec<usize>> = vec![Vec::new(); n_count + 1];
        follow[n_count].push(t_count); // EOF after the augmented start
        let mut changed = true;
        while changed {
            changed = false;
            for (lhs, rhs) in rules {
                for (i, &sym) in rhs.iter().enumerate() {
                    if sym < t_count {
                        continue;
                    }
                    let nt = sym - t_count;
                    let mut tail_nullable = true;
                    for &after in &rhs[i + 1..] {
                        if after < t_count {
                            if !follow[nt].contains(&after) {
                                follow[nt].push(after);
                                changed = true;
                            }
                            tail_nullable = false;
                            break;
                        }
                        let after_nt = after - t_count;
                        let add: Vec<usize> = first[after_nt].clone();
                        for t in add {
                            if !follow[nt].contains(&t) {
                                follow[nt].push(t);
                                changed = true;
                            }
                        }
                        if !nullable[after_nt] {
                            tail_nullable = false;
                            break;
                        }
                    }
                    if tail_nullable {
                        let add: Vec<usize> = follow[*lhs].clone();
                        for t in add {
                            if !follow[nt].contains(&t) {
                                follow[nt].push(t);
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
        follow
    }
}

// ---------------------------------------------------------------------------
// DFA packing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DfaBuilder {
    states: Vec<BuildState>,
}

#[derive(Default)]
struct BuildState {
    accept: Option<Term>,
    edges: Vec<(u16, u16, usize)>,
}

impl DfaBuilder {
    fn add(&mut self, pattern: &TokenPattern, term: Term, name: &str) -> Result<(), GrammarError> {
        if self.states.is_empty() {
            self.states.push(BuildState::default());
        }
        match pattern {
            TokenPattern::Literal(text) => self.add_literal(text, term, name),
            TokenPattern::Class { ranges, repeat } => self.add_class(ranges, *repeat, term, name),
        }
    }

    fn add_literal(&mut self, text: &str, term: Term, name: &str) -> Result<(), GrammarError> {
        let mut cur = 0usize;
        for ch in text.chars() {
            let code = code_of(ch)?;
            let existing = self.states[cur]
                .edges
                .iter()
                .find(|&&(from, to, _)| from == code && to == code + 1)
                .map(|&(_, _, target)| target);
            cur = match existing {
                Some(target) => target,
                None => {
                    if self.states[cur]
                        .edges
                        .iter()
                        .any(|&(from, to, _)| from <= code && code < to)
                    {
                        return Err(GrammarError::TokenConflict(name.to_string()));
                    }
                    self.states.push(BuildState::default());
                    let target = self.states.len() - 1;
                    self.states[cur].edges.push((code, code + 1, target));
                    target
                }
            };
        }
        if self.states[cur].accept.is_some() {
            return Err(GrammarError::TokenConflict(name.to_string()));
        }
        self.states[cur].accept = Some(term);
        Ok(())
    }

    fn add_class(
        &mut self,
        ranges: &[(char, char)],
        repeat: bool,
        term: Term,
        name: &str,
    ) -> Result<(), GrammarError> {
        self.states.push(BuildState {
            accept: Some(term),
            edges: Vec::new(),
        });
        let target = self.states.len() - 1;
        for &(lo, hi) in ranges {
            let from = code_of(lo)?;
            let to = code_of(hi)? + 1;
            let overlaps = self.states[0]
                .edges
                .iter()
                .any(|&(f, t, _)| from < t && f < to);
            if overlaps {
                return Err(GrammarError::TokenConflict(name.to_string()));
            }
            self.states[0].edges.push((from, to, target));
            if repeat {
                self.states[target].edges.push((from, to, target));
            }
        }
        Ok(())
    }

    fn pack(self) -> DfaTable {
        let mut states = self.states;
        if states.is_empty() {
            states.push(BuildState::default());
        }
        let mut offsets = Vec::with_capacity(states.len());
        let mut at = 0usize;
        for state in &states {
            offsets.push(at);
            at += 3 + 2 * usize::from(state.accept.is_some()) + 3 * state.edges.len();
        }
        debug_assert!(at <= usize::from(u16::MAX));
        let mut data = Vec::with_capacity(at);
        for state in &mut states {
            state.edges.sort_unstable_by_key(|&(from, _, _)| from);
        }
        for (i, state) in states.iter().enumerate() {
            let acc_end = offsets[i] + 3 + 2 * usize::from(state.accept.is_some());
            let edge_end = acc_end + 3 * state.edges.len();
            data.push(1);
            data.push(acc_end as u16);
            data.push(edge_end as u16);
            if let Some(term) = state.accept {
                data.push(term);
                data.push(1);
            }
            for &(from, to, target) in &state.edges {
                data.push(from);
                data.push(to);
                data.push(offsets[target] as u16);
            }
        }
        DfaTable {
            data: data.into_boxed_slice(),
        }
    }
}

fn code_of(ch: char) -> Result<u16, GrammarError> {
    u16::try_from(ch as u32).map_err(|_| GrammarError::UnsupportedChar(ch))
}
