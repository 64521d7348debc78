//! # Error Recovery
//!
//! Strategies applied when a head has no action for the current token. All
//! of them fork the head with a score penalty, so recovered parses only
//! win when nothing clean survives:
//!
//! 1. *Recover table*: skip tokens (as error leaves) until one of the
//!    state's `recover` terminals appears, then continue in its target
//!    state.
//! 2. *Token insertion*: force the reduction [`any_reduce`] offers, as if
//!    the missing token had been seen.
//! 3. *Token deletion*: drop the offending token into an error leaf and
//!    stay in the same state.
//!
//! When every strategy fails and this is the last live head, the parse is
//! accepted as-is with an error node spanning the remaining input —
//! recovery is soft, the parser always produces a tree.
//!
//! [`any_reduce`]: crate::table::ParseState::any_reduce

use super::{Parse, RECOVER_DELETE_COST, RECOVER_INSERT_COST, RECOVER_SKIP_COST};
use crate::error::ParseError;
use crate::lexer::cache::{CachedToken, TokenizerHost};
use crate::parser::stack::Stack;
use crate::table::{action, ParseState, ParserTables, Term, TERM_EOF};

/// A token skipped while scanning for a recover terminal.
struct SkippedToken {
    start: u32,
    end: u32,
    look_ahead: u32,
}

impl Parse<'_> {
    pub(crate) fn recover(
        &mut self,
        stack: Stack,
        token: &CachedToken,
    ) -> Result<(), ParseError> {
        self.metrics.recoveries += 1;
        if stack.recovering >= self.parser.config.recovery_attempts {
            // This head is out of attempts; it only survives if nothing
            // else can produce a tree.
            if self.heads.is_empty() && self.finished.is_empty() {
                self.accept_with_error(stack);
            }
            return Ok(());
        }

        let parser = self.parser;
        let tables: &ParserTables = &parser.tables;
        let state = &tables.states[stack.state as usize];
        let next_recovering = stack.recovering + 1;
        let mut recovered: Vec<Stack> = Vec::new();

        for &(term, rstate) in state.recover.iter() {
            if let Some((found, skipped)) = self.scan_for(state, stack.state, term, stack.pos) {
                let mut head = stack.fork();
                self.metrics.forks += 1;
                for skip in &skipped {
                    head.err_leaf(skip.start, skip.end);
                    head.lookahead.push((skip.start, skip.look_ahead));
                }
                head.score -= RECOVER_SKIP_COST * (skipped.len() as i32 + 1);
                head.pos = found;
                head.reduce_pos = found;
                head.recover_to(&mut self.arena, rstate);
                head.recovering = next_recovering;
                recovered.push(head);
            }
        }

        let insert = state.any_reduce();
        if action::is_reduce(insert) {
            let depth = action::reduce_depth(insert);
            let term = action::reduce_term(insert);
            let target = stack
                .frame_below(&self.arena, depth)
                .and_then(|below| tables.states[below.state as usize].get_goto(term));
            if let Some(target) = target {
                let mut head = stack.fork();
                self.metrics.forks += 1;
                head.reduce(&mut self.arena, depth, term, target);
                head.score -= RECOVER_INSERT_COST;
                head.recovering = next_recovering;
                self.metrics.reductions += 1;
                recovered.push(head);
            }
        }

        if token.value != TERM_EOF && token.end > stack.pos {
            let mut head = stack.fork();
            self.metrics.forks += 1;
            head.err_leaf(token.start, token.end);
            head.lookahead.push((token.start, token.look_ahead));
            head.pos = token.end;
            head.reduce_pos = token.end;
            head.score -= RECOVER_DELETE_COST;
            head.recovering = next_recovering;
            recovered.push(head);
        }

        if recovered.is_empty() {
            if self.heads.is_empty() && self.finished.is_empty() {
                self.accept_with_error(stack);
            }
            return Ok(());
        }
        for head in recovered {
            self.add_head(head);
        }
        Ok(())
    }

    /// Scan forward from `from` for a token of `term`, collecting the real
    /// tokens skipped on the way. Bounded by the configured scan limit.
    fn scan_for(
        &mut self,
        state: &ParseState,
        state_id: u32,
        term: Term,
        from: u32,
    ) -> Option<(u32, Vec<SkippedToken>)> {
        let parser = self.parser;
        let host = TokenizerHost {
            tables: &parser.tables,
            externals: &parser.externals,
            dialect: &parser.dialect,
        };
        let mut pos = from;
        let mut skipped = Vec::new();
        for _ in 0..=parser.config.recover_scan_limit {
            while let Some(skip) =
                self.cache
                    .skip_token(&host, &mut self.stream, state, state_id, pos)
            {
                pos = skip.end;
            }
            let (token, _) = self
                .cache
                .get_actions(&host, &mut self.stream, state, state_id, pos);
            if token.value == term {
                return Some((pos, skipped));
            }
            if token.value == TERM_EOF || token.end <= pos {
                return None;
            }
            skipped.push(SkippedToken {
                start: token.start,
                end: token.end,
                look_ahead: token.look_ahead,
            });
            pos = token.end;
        }
        None
    }
}
