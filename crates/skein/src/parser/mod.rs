//! # GLR Parser Core
//!
//! Drives the table-driven GLR step loop: a frontier of stack heads is
//! advanced one head at a time — always the head with the lowest input
//! position, ties broken by score — so heads stay synchronized and the
//! result is deterministic for identical inputs, tables, and edits.
//!
//! Conflicting actions fork the head (buffer copied by value, frames
//! shared); heads that converge on an identical state chain merge, keeping
//! the higher score. Shifts raise a head's score, reductions and recovery
//! lower it, and at each conflict the fork the configured
//! [`ConflictPreference`] favors gets a small bonus, which is what makes
//! associativity tie-breaks reachable from configuration.
//!
//! Parsing is synchronous and interruptible: [`Parse::advance`] takes a
//! step budget and returns `None` when it runs out, leaving a resumable
//! handle; [`Parse::halt`] cancels, wrapping the consumed prefix and an
//! error node for the remainder.

pub(crate) mod stack;

mod recovery;

use crate::error::{ParseError, TableError};
use crate::incremental::FragmentMap;
use crate::lexer::cache::{PendingAction, TokenCache, TokenizerHost};
use crate::lexer::{ExternalTokenizer, Input, InputGap, InputStream, StringInput};
use crate::syntax::build::{BuildConfig, TreeAssembly};
use crate::syntax::Tree;
use crate::table::{action, Dialect, ParserTables, TokenizerKind, NO_ALWAYS_REDUCE};
use smallvec::SmallVec;
use stack::{Stack, StackArena};
use std::sync::Arc;

/// Score delta for consuming a token.
const SHIFT_SCORE: i32 = 16;
/// Score delta for a reduction.
const REDUCE_COST: i32 = 1;
/// Bonus for the fork the conflict preference favors.
const CONFLICT_BONUS: i32 = 1;
/// Per-token penalty while skipping toward a recover-table terminal.
/// Cheaper than deletion: table-guided recovery reflects grammar intent.
pub(crate) const RECOVER_SKIP_COST: i32 = 50;
/// Penalty for a forced reduction (synthetic token insertion).
pub(crate) const RECOVER_INSERT_COST: i32 = 150;
/// Penalty for deleting the offending token.
pub(crate) const RECOVER_DELETE_COST: i32 = 100;

/// Which side of a shift/reduce conflict the parser favors when the
/// completed parses otherwise tie. Preferring reductions yields
/// left-associative trees for ambiguous binary operators, preferring
/// shifts the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPreference {
    #[default]
    Reduce,
    Shift,
}

/// Tuning knobs for the runtime.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Cap on live heads; the worst-scoring heads beyond it are pruned.
    pub max_heads: usize,
    pub conflict_preference: ConflictPreference,
    /// Consecutive recovery attempts per head before it is abandoned.
    pub recovery_attempts: u32,
    /// Tokens a recover-table scan may skip before giving up.
    pub recover_scan_limit: usize,
    /// Minimum quads before a run is packed into a `TreeBuffer`.
    pub buffer_run_min: usize,
    /// Maximum source span of one `TreeBuffer`.
    pub buffer_max_span: u32,
    /// Maximum packed nodes per `TreeBuffer`.
    pub buffer_max_nodes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_heads: 32,
            conflict_preference: ConflictPreference::default(),
            recovery_attempts: 8,
            recover_scan_limit: 10,
            buffer_run_min: 8,
            buffer_max_span: 1024,
            buffer_max_nodes: 256,
        }
    }
}

/// Counters describing one parse.
#[derive(Debug, Clone, Default)]
pub struct ParseMetrics {
    pub tokens_consumed: usize,
    pub reductions: usize,
    pub forks: usize,
    pub merges: usize,
    pub reused_nodes: usize,
    pub recoveries: usize,
    pub steps: usize,
}

/// A finished parse: the tree always covers the full input, with error
/// nodes standing in for anything recovery had to patch over.
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Arc<Tree>,
    pub metrics: ParseMetrics,
}

/// A configured parser: validated tables, bound external tokenizers, the
/// active dialect, and tuning. Cheap to clone; tables are shared.
#[derive(Clone)]
pub struct Parser {
    tables: Arc<ParserTables>,
    externals: Box<[Arc<dyn ExternalTokenizer>]>,
    dialect: Dialect,
    config: ParserConfig,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("tables", &self.tables)
            .field("externals", &self.externals.len())
            .field("dialect", &self.dialect)
            .field("config", &self.config)
            .finish()
    }
}

impl Parser {
    /// Build a parser from tables with no external tokenizers.
    ///
    /// # Errors
    ///
    /// Any table inconsistency, reported with the offending state.
    pub fn new(tables: ParserTables) -> Result<Self, TableError> {
        Self::with_externals(tables, Vec::new())
    }

    /// Build a parser, binding external tokenizers by slot.
    ///
    /// # Errors
    ///
    /// Table inconsistencies, or an external slot with no implementation.
    pub fn with_externals(
        mut tables: ParserTables,
        externals: Vec<Arc<dyn ExternalTokenizer>>,
    ) -> Result<Self, TableError> {
        tables.finish();
        tables.validate()?;
        if tables.states.is_empty() {
            return Err(TableError::UnknownState { state: 0, count: 0 });
        }
        for def in tables.tokenizers.iter() {
            if let TokenizerKind::External(slot) = def.kind {
                if usize::from(slot) >= externals.len() {
                    return Err(TableError::UnboundExternal {
                        slot,
                        bound: externals.len(),
                    });
                }
            }
        }
        let dialect = tables.dialect(&[])?;
        Ok(Self {
            tables: Arc::new(tables),
            externals: externals.into_boxed_slice(),
            dialect,
            config: ParserConfig::default(),
        })
    }

    /// Select dialects by name.
    ///
    /// # Errors
    ///
    /// [`TableError::UnknownDialect`] for unrecognized names.
    pub fn with_dialect(mut self, names: &[&str]) -> Result<Self, TableError> {
        self.dialect = self.tables.dialect(names)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn tables(&self) -> &ParserTables {
        &self.tables
    }

    /// Parse a string to completion.
    ///
    /// # Errors
    ///
    /// Table inconsistencies discovered at runtime or host input failures.
    pub fn parse(&self, text: &str) -> Result<ParseResult, ParseError> {
        let mut input = StringInput::new(text);
        self.parse_with(&mut input, &[], None)
    }

    /// Parse arbitrary input to completion, optionally with gaps and a
    /// reuse map from a previous parse.
    ///
    /// # Errors
    ///
    /// Table inconsistencies discovered at runtime or host input failures.
    pub fn parse_with(
        &self,
        input: &mut dyn Input,
        gaps: &[InputGap],
        fragments: Option<&FragmentMap>,
    ) -> Result<ParseResult, ParseError> {
        let mut parse = self.start_parse(input, gaps, fragments);
        loop {
            if let Some(result) = parse.advance(usize::MAX)? {
                return Ok(result);
            }
        }
    }

    /// Begin an interruptible parse.
    #[must_use]
    pub fn start_parse<'a>(
        &'a self,
        input: &'a mut dyn Input,
        gaps: &[InputGap],
        fragments: Option<&'a FragmentMap>,
    ) -> Parse<'a> {
        let stream = InputStream::new(input, gaps);
        let mut arena = StackArena::default();
        let heads = vec![Stack::start(&mut arena, 0)];
        Parse {
            parser: self,
            cache: TokenCache::new(self.tables.tokenizers.len()),
            stream,
            arena,
            heads,
            finished: Vec::new(),
            fragments,
            metrics: ParseMetrics::default(),
        }
    }

    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            buffer_run_min: self.config.buffer_run_min,
            buffer_max_span: self.config.buffer_max_span,
            buffer_max_nodes: self.config.buffer_max_nodes,
        }
    }
}

/// A resumable parse in progress. The handle owns the frontier and the
/// current input position; dropping it abandons the parse.
pub struct Parse<'a> {
    pub(crate) parser: &'a Parser,
    pub(crate) cache: TokenCache,
    pub(crate) stream: InputStream<'a>,
    pub(crate) arena: StackArena,
    pub(crate) heads: Vec<Stack>,
    pub(crate) finished: Vec<Stack>,
    fragments: Option<&'a FragmentMap>,
    pub(crate) metrics: ParseMetrics,
}

impl Parse<'_> {
    /// The lowest input position of any live head (the input is consumed up
    /// to here on every path).
    #[must_use]
    pub fn pos(&self) -> u32 {
        self.heads
            .iter()
            .map(|h| h.pos)
            .min()
            .unwrap_or_else(|| self.stream.end())
    }

    #[must_use]
    pub fn metrics(&self) -> &ParseMetrics {
        &self.metrics
    }

    /// Run up to `max_steps` head steps. Returns the result once every head
    /// has accepted or been pruned, `None` when the budget ran out first.
    ///
    /// # Errors
    ///
    /// Table inconsistencies discovered at runtime or host input failures.
    pub fn advance(&mut self, max_steps: usize) -> Result<Option<ParseResult>, ParseError> {
        for _ in 0..max_steps {
            if self.heads.is_empty() {
                return Ok(Some(self.build_result()));
            }
            self.step()?;
        }
        if self.heads.is_empty() {
            return Ok(Some(self.build_result()));
        }
        Ok(None)
    }

    /// Cancel the parse, producing a partial tree: the best head's consumed
    /// prefix with an error node spanning the remaining input.
    ///
    /// # Errors
    ///
    /// A latched host input failure.
    pub fn halt(mut self) -> Result<ParseResult, ParseError> {
        if let Some(err) = self.stream.take_error() {
            return Err(err.into());
        }
        let end = self.stream.end();
        let mut best = if let Some(i) = self.best_finished_index() {
            self.finished.swap_remove(i)
        } else {
            let mut best_idx = None;
            for (i, head) in self.heads.iter().enumerate() {
                let better = best_idx.is_none_or(|b: usize| {
                    let cur = &self.heads[b];
                    (head.pos, head.score) > (cur.pos, cur.score)
                });
                if better {
                    best_idx = Some(i);
                }
            }
            match best_idx {
                Some(i) => self.heads.swap_remove(i),
                None => Stack::start(&mut self.arena, 0),
            }
        };
        if best.reduce_pos < end || best.buffer.is_empty() {
            best.err_leaf(best.reduce_pos, end);
        }
        self.heads.clear();
        self.finished.clear();
        self.finished.push(best);
        Ok(self.build_result())
    }

    fn step(&mut self) -> Result<(), ParseError> {
        if self.stream.has_error() {
            let err = self.stream.take_error().expect("error is latched");
            return Err(err.into());
        }
        self.metrics.steps += 1;

        let idx = self.pick_head();
        let mut stack = self.heads.remove(idx);
        let parser = self.parser;
        let tables: &ParserTables = &parser.tables;
        let state_id = stack.state;
        let state = &tables.states[state_id as usize];

        // An unconditional reduce in a state with no shifts never needs a
        // token. With shifts present, tokenize first and prefer a matching
        // action; the unconditional reduce only fires when nothing matches.
        if state.always_reduce != NO_ALWAYS_REDUCE && !state.has_shifts {
            let reduce = state.always_reduce;
            self.apply_reduce(tables, &mut stack, reduce)?;
            self.add_head(stack);
            return Ok(());
        }

        let host = TokenizerHost {
            tables,
            externals: &parser.externals,
            dialect: &parser.dialect,
        };

        // Skip tokens advance input but stay out of the stack machinery.
        while let Some(skip) =
            self.cache
                .skip_token(&host, &mut self.stream, state, state_id, stack.pos)
        {
            stack.skip_leaf(skip.value, skip.start, skip.end);
            stack.lookahead.push((skip.start, skip.look_ahead));
            stack.pos = skip.end;
            self.metrics.tokens_consumed += 1;
        }

        // Incremental reuse: shift a cached subtree in one step when the
        // state can goto on its root term.
        if let Some(fragments) = self.fragments {
            let reusable = fragments.best_at(stack.pos, |tree| {
                tree.tag().is_some_and(|tag| state.get_goto(tag).is_some())
            });
            if let Some(tree) = reusable {
                let tag = tree.tag().expect("reusable subtrees are tagged");
                let target = state.get_goto(tag).expect("goto checked above");
                let tree = Arc::clone(tree);
                let start = stack.pos;
                stack.shift_reused(&mut self.arena, target, start, &tree);
                stack.score += SHIFT_SCORE;
                self.metrics.reused_nodes += 1;
                self.add_head(stack);
                return Ok(());
            }
        }

        let (token, actions) =
            self.cache
                .get_actions(&host, &mut self.stream, state, state_id, stack.pos);
        if self.stream.has_error() {
            let err = self.stream.take_error().expect("error is latched");
            return Err(err.into());
        }

        if actions.is_empty() {
            if state.always_reduce != NO_ALWAYS_REDUCE {
                let reduce = state.always_reduce;
                self.apply_reduce(tables, &mut stack, reduce)?;
                self.add_head(stack);
                return Ok(());
            }
            if state.default_reduce != 0 {
                let reduce = state.default_reduce;
                self.apply_reduce(tables, &mut stack, reduce)?;
                self.add_head(stack);
                return Ok(());
            }
            return self.recover(stack, &token);
        }

        // Order conflicting actions so the preferred fork comes first.
        let prefer = parser.config.conflict_preference;
        let mut ordered: SmallVec<[&PendingAction; 4]> = actions.iter().collect();
        ordered.sort_by_key(|a| conflict_rank(a.action, prefer));

        let forked = ordered.len() > 1;
        let mut original = Some(stack);
        for (i, pending) in ordered.iter().enumerate() {
            let mut head = if i + 1 == ordered.len() {
                original.take().expect("original head is consumed last")
            } else {
                self.metrics.forks += 1;
                original.as_ref().expect("original head still present").fork()
            };
            if forked && i == 0 {
                head.score += CONFLICT_BONUS;
            }
            if pending.action == action::ACCEPT {
                self.finished.push(head);
            } else if action::is_shift(pending.action) {
                let target = action::shift_target(pending.action);
                head.shift(&mut self.arena, target, pending.term, token.start, pending.end);
                head.lookahead.push((token.start, token.look_ahead));
                head.score += SHIFT_SCORE;
                self.metrics.tokens_consumed += 1;
                self.add_head(head);
            } else {
                self.apply_reduce(tables, &mut head, pending.action)?;
                self.add_head(head);
            }
        }
        Ok(())
    }

    /// Index of the next head to extend: lowest position, then highest
    /// score, then frontier order.
    fn pick_head(&self) -> usize {
        let mut best = 0;
        for (i, head) in self.heads.iter().enumerate().skip(1) {
            let b = &self.heads[best];
            if head.pos < b.pos || (head.pos == b.pos && head.score > b.score) {
                best = i;
            }
        }
        best
    }

    pub(crate) fn apply_reduce(
        &mut self,
        tables: &ParserTables,
        stack: &mut Stack,
        reduce: i32,
    ) -> Result<(), ParseError> {
        let depth = action::reduce_depth(reduce);
        let term = action::reduce_term(reduce);
        let below = stack
            .frame_below(&self.arena, depth)
            .ok_or(TableError::BadAction {
                state: stack.state,
                action: reduce,
            })?;
        let target = tables.states[below.state as usize]
            .get_goto(term)
            .ok_or(TableError::MissingGoto {
                state: below.state,
                term,
            })?;
        stack.reduce(&mut self.arena, depth, term, target);
        stack.score -= REDUCE_COST;
        self.metrics.reductions += 1;
        Ok(())
    }

    /// Insert a head into the frontier, merging with an identical-chain
    /// head (higher score wins, ties keep the incumbent) and pruning the
    /// worst head beyond the configured cap.
    pub(crate) fn add_head(&mut self, head: Stack) {
        for i in 0..self.heads.len() {
            if self.heads[i].same_chain(&head, &self.arena) {
                self.metrics.merges += 1;
                if head.score > self.heads[i].score {
                    self.heads[i] = head;
                }
                return;
            }
        }
        self.heads.push(head);
        if self.heads.len() > self.parser.config.max_heads {
            let mut worst = 0;
            for (i, head) in self.heads.iter().enumerate().skip(1) {
                if head.score <= self.heads[worst].score {
                    worst = i;
                }
            }
            self.heads.remove(worst);
        }
    }

    fn best_finished_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, stack) in self.finished.iter().enumerate() {
            if best.is_none_or(|b| stack.score > self.finished[b].score) {
                best = Some(i);
            }
        }
        best
    }

    fn build_result(&mut self) -> ParseResult {
        let len = self.stream.end();
        let best = match self.best_finished_index() {
            Some(i) => self.finished.swap_remove(i),
            None => {
                // Every head was pruned without acceptance; produce a bare
                // error tree covering the input.
                let mut stack = Stack::start(&mut self.arena, 0);
                stack.err_leaf(0, len);
                stack
            }
        };
        let assembly = TreeAssembly::new(
            &best.buffer,
            &best.reused,
            &best.lookahead,
            self.parser.build_config(),
        );
        ParseResult {
            tree: assembly.finish(len),
            metrics: self.metrics.clone(),
        }
    }

    /// Accept a head as-is, covering any unconsumed remainder with an
    /// error leaf. Recovery's last resort.
    pub(crate) fn accept_with_error(&mut self, mut stack: Stack) {
        let end = self.stream.end();
        if stack.reduce_pos < end || stack.buffer.is_empty() {
            stack.err_leaf(stack.reduce_pos, end);
            stack.pos = end;
            stack.reduce_pos = end;
        }
        self.finished.push(stack);
    }
}

/// Sort rank for conflicting actions: accepts first, then the preferred
/// class.
fn conflict_rank(a: i32, prefer: ConflictPreference) -> u8 {
    if a == action::ACCEPT {
        return 0;
    }
    let is_reduce = action::is_reduce(a);
    match prefer {
        ConflictPreference::Reduce if is_reduce => 1,
        ConflictPreference::Shift if !is_reduce => 1,
        _ => 2,
    }
}
