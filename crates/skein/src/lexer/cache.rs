//! # Token Cache
//!
//! Per-position token memoization and the action-gathering pass that runs a
//! state's tokenizers in priority order.
//!
//! Non-contextual tokenizer results depend only on the input position and
//! the active token group, so they are cached in a per-tokenizer slot and
//! reused across stacks sitting at the same position. Contextual tokenizers
//! depend on parse-stack state and always run fresh.

use crate::lexer::dfa;
use crate::lexer::{ExternalTokenizer, InputStream, TokenContext};
use crate::table::{Dialect, ParseState, ParserTables, Term, TokenizerKind, NO_TERM, TERM_EOF, TERM_ERR};
use smallvec::SmallVec;
use std::sync::Arc;

/// A token produced by one tokenizer run, together with everything needed
/// to decide whether the run can be reused.
#[derive(Debug, Clone, Copy)]
pub struct CachedToken {
    /// Start position in the underlying coordinate system.
    pub start: u32,
    /// Matched term, or [`NO_TERM`] when the tokenizer found nothing.
    pub value: Term,
    /// End position (exclusive), resolved through gaps.
    pub end: u32,
    /// Term recorded by an `extend` tokenizer overlapping this token, or
    /// [`NO_TERM`].
    pub extended: Term,
    /// Exclusive end of the bytes inspected while recognizing the token.
    /// Incremental invalidation depends on this.
    pub look_ahead: u32,
    /// Group mask the token was searched under. `0` marks an unused slot.
    pub mask: u16,
    /// State hash for contextual results.
    pub context: u32,
}

impl CachedToken {
    /// A fresh, empty token at `pos`.
    #[must_use]
    pub const fn blank(pos: u32) -> Self {
        Self {
            start: pos,
            value: NO_TERM,
            end: pos,
            extended: NO_TERM,
            look_ahead: pos,
            mask: 0,
            context: 0,
        }
    }
}

/// One applicable `(action, term, end)` triple at the current position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingAction {
    pub action: i32,
    pub term: Term,
    pub end: u32,
}

pub(crate) type PendingActions = SmallVec<[PendingAction; 8]>;

/// Everything the tokenization pass reads but never mutates.
pub(crate) struct TokenizerHost<'a> {
    pub tables: &'a ParserTables,
    pub externals: &'a [Arc<dyn ExternalTokenizer>],
    pub dialect: &'a Dialect,
}

/// Tokenizer result memo, one slot per tokenizer in the tables.
pub(crate) struct TokenCache {
    tokens: Vec<CachedToken>,
}

impl TokenCache {
    pub fn new(tokenizer_count: usize) -> Self {
        Self {
            tokens: vec![CachedToken::blank(u32::MAX); tokenizer_count],
        }
    }

    /// Run the state's skip tokenizer at `pos`. Returns the skip token when
    /// it matched a non-empty range.
    pub fn skip_token(
        &mut self,
        host: &TokenizerHost<'_>,
        stream: &mut InputStream<'_>,
        state: &ParseState,
        state_id: u32,
        pos: u32,
    ) -> Option<CachedToken> {
        let index = state.skip?;
        let group_mask = 1u16 << state.token_group;
        let token = self.run(index, host, stream, state_id, pos, group_mask);
        (token.value != NO_TERM && token.end > pos).then_some(token)
    }

    /// Tokenize at `pos` for a head in `state`, running the state's
    /// tokenizers in priority order, and collect every action the state has
    /// for the winning token(s).
    ///
    /// The first token from a non-`extend` tokenizer suppresses the rest,
    /// except that `fallback` tokenizers still run while the tokens found so
    /// far produced no action. `extend` tokenizers record their value but
    /// keep the scan going.
    pub fn get_actions(
        &mut self,
        host: &TokenizerHost<'_>,
        stream: &mut InputStream<'_>,
        state: &ParseState,
        state_id: u32,
        pos: u32,
    ) -> (CachedToken, PendingActions) {
        let group_mask = 1u16 << state.token_group;
        let mut actions = PendingActions::new();
        let mut main: Option<CachedToken> = None;
        let mut main_accepted = false;
        let mut suppressed = false;
        let mut have_actions = false;
        let mut extended = NO_TERM;

        for &index in &state.tokenizers {
            let def = &host.tables.tokenizers[index as usize];
            if def.fallback {
                if main.is_none() || have_actions {
                    continue;
                }
            } else if suppressed {
                continue;
            }
            let mut token = self.run(index, host, stream, state_id, pos, group_mask);
            if def.extend && token.value != NO_TERM {
                // Remember the extended term for whichever token wins.
                extended = token.value;
                push_actions(state, token.value, token.end, &mut have_actions, &mut actions);
                continue;
            }
            if token.value == NO_TERM {
                continue;
            }
            token.extended = extended;
            let before = actions.len();
            push_actions(state, token.value, token.end, &mut have_actions, &mut actions);
            let added = actions.len() > before;
            if main.is_none() || (added && !main_accepted) {
                main = Some(token);
                main_accepted = added;
            }
            suppressed = true;
            if added {
                break;
            }
        }

        let main = main.unwrap_or_else(|| {
            let mut token = CachedToken::blank(pos);
            if pos >= stream.end() {
                token.value = TERM_EOF;
                token.end = pos;
            } else {
                // Dead position: synthesize a one-character error token.
                stream.reset(pos, None);
                stream.advance_char();
                token.value = TERM_ERR;
                token.end = stream.pos();
                token.look_ahead = stream.token().look_ahead;
            }
            if actions.is_empty() {
                push_actions(state, token.value, token.end, &mut have_actions, &mut actions);
            }
            token
        });

        (main, actions)
    }

    fn run(
        &mut self,
        index: u32,
        host: &TokenizerHost<'_>,
        stream: &mut InputStream<'_>,
        state_id: u32,
        pos: u32,
        group_mask: u16,
    ) -> CachedToken {
        let def = &host.tables.tokenizers[index as usize];
        if !def.contextual {
            let cached = self.tokens[index as usize];
            if cached.start == pos && cached.mask == group_mask {
                return cached;
            }
        }
        stream.reset(pos, Some(CachedToken::blank(pos)));
        match &def.kind {
            TokenizerKind::Dfa(table) => dfa::run(table, stream, group_mask, host.dialect),
            TokenizerKind::External(slot) => {
                let ctx = TokenContext {
                    state: state_id,
                    dialect: host.dialect,
                };
                host.externals[usize::from(*slot)].token(stream, &ctx);
            }
        }
        let mut token = *stream.token();
        token.start = pos;
        token.mask = group_mask;
        token.context = state_id;
        if !def.contextual {
            self.tokens[index as usize] = token;
        }
        token
    }
}

/// Append every action `state` holds for `term`.
fn push_actions(
    state: &ParseState,
    term: Term,
    end: u32,
    have_actions: &mut bool,
    out: &mut PendingActions,
) {
    for &(_, action) in state.actions_for(term) {
        out.push(PendingAction { action, term, end });
        *have_actions = true;
    }
}
