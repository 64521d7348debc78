//! # Table Encoder
//!
//! Serializes [`ParserTables`] into the binary blob format the runtime
//! loads (see [`crate::table::binary`]). The real encoder lives in the
//! offline generator; this one exists so loader round-trips can be tested
//! without it.

use crate::table::binary::{MAGIC, NO_SKIP, VERSION};
use crate::table::{ParserTables, TokenizerKind};

/// Encode tables into the loadable blob format.
#[must_use]
pub fn encode_tables(tables: &ParserTables) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&tables.max_term.to_le_bytes());
    out.extend_from_slice(&(tables.states.len() as u32).to_le_bytes());
    out.extend_from_slice(&(tables.tokenizers.len() as u32).to_le_bytes());
    out.extend_from_slice(&(tables.term_names.len() as u32).to_le_bytes());
    out.extend_from_slice(&(tables.dialects.len() as u32).to_le_bytes());

    for state in tables.states.iter() {
        out.push(state.token_group);
        out.extend_from_slice(&state.skip.unwrap_or(NO_SKIP).to_le_bytes());
        out.extend_from_slice(&state.always_reduce.to_le_bytes());
        out.extend_from_slice(&state.default_reduce.to_le_bytes());
        out.extend_from_slice(&(state.tokenizers.len() as u16).to_le_bytes());
        for &index in &state.tokenizers {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out.extend_from_slice(&(state.actions.len() as u16).to_le_bytes());
        for &(term, action) in state.actions.iter() {
            out.extend_from_slice(&term.to_le_bytes());
            out.extend_from_slice(&action.to_le_bytes());
        }
        out.extend_from_slice(&(state.goto.len() as u16).to_le_bytes());
        for &(term, target) in state.goto.iter() {
            out.extend_from_slice(&term.to_le_bytes());
            out.extend_from_slice(&target.to_le_bytes());
        }
        out.extend_from_slice(&(state.recover.len() as u16).to_le_bytes());
        for &(term, target) in state.recover.iter() {
            out.extend_from_slice(&term.to_le_bytes());
            out.extend_from_slice(&target.to_le_bytes());
        }
    }

    for def in tables.tokenizers.iter() {
        let flags =
            u8::from(def.contextual) | (u8::from(def.fallback) << 1) | (u8::from(def.extend) << 2);
        out.push(flags);
        match &def.kind {
            TokenizerKind::Dfa(table) => {
                out.push(0);
                out.extend_from_slice(&(table.data.len() as u32).to_le_bytes());
                for &word in table.data.iter() {
                    out.extend_from_slice(&word.to_le_bytes());
                }
            }
            TokenizerKind::External(slot) => {
                out.push(1);
                out.extend_from_slice(&slot.to_le_bytes());
            }
        }
    }

    for name in tables.term_names.iter() {
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }

    for dialect in tables.dialects.iter() {
        out.extend_from_slice(&(dialect.name.len() as u16).to_le_bytes());
        out.extend_from_slice(dialect.name.as_bytes());
        out.extend_from_slice(&(dialect.terms.len() as u16).to_le_bytes());
        for &term in dialect.terms.iter() {
            out.extend_from_slice(&term.to_le_bytes());
        }
    }

    out
}
