//! # Binary Table Blob
//!
//! Loader for the offline-generated table format. Everything is
//! little-endian. Layout:
//!
//! ```text
//! magic   b"GLRT"
//! version u16 (currently 1)
//! max_term u16
//! state_count u32, tokenizer_count u32, term_name_count u32, dialect_count u32
//! states:      group u8, skip u32 (MAX = none), always_reduce i32,
//!              default_reduce i32, tokenizers (u16 n + u32*n),
//!              actions (u16 n + (u16, i32)*n), goto (u16 n + (u16, u32)*n),
//!              recover (u16 n + (u16, u32)*n)
//! tokenizers:  flags u8 (contextual | fallback << 1 | extend << 2),
//!              kind u8: 0 = DFA (u32 words + u16*words), 1 = external (u16 slot)
//! term names:  u16 len + UTF-8 bytes, dense by term id
//! dialects:    u16 name len + UTF-8, u16 n + u16 terms
//! ```
//!
//! The loader only checks structural well-formedness; cross-reference
//! validation happens in [`ParserTables::validate`] when a parser is built.

use crate::error::TableError;
use crate::table::{
    DfaTable, DialectSpec, ParseState, ParserTables, TokenizerDef, TokenizerKind,
};
use compact_str::CompactString;
use smallvec::SmallVec;

/// File magic.
pub const MAGIC: [u8; 4] = *b"GLRT";

/// Supported format version.
pub const VERSION: u16 = 1;

/// Sentinel for "no skip tokenizer" in the state records.
pub const NO_SKIP: u32 = u32::MAX;

struct Reader<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], TableError> {
        if self.at + n > self.data.len() {
            return Err(TableError::MalformedBlob {
                offset: self.at,
                reason: what,
            });
        }
        let slice = &self.data[self.at..self.at + n];
        self.at += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, TableError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, TableError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, TableError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self, what: &'static str) -> Result<i32, TableError> {
        let b = self.take(4, what)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, what: &'static str) -> Result<CompactString, TableError> {
        let len = usize::from(self.u16(what)?);
        let at = self.at;
        let bytes = self.take(len, what)?;
        std::str::from_utf8(bytes)
            .map(CompactString::from)
            .map_err(|_| TableError::MalformedBlob {
                offset: at,
                reason: "invalid UTF-8 in name",
            })
    }
}

/// Decode a table blob. The result still needs [`ParserTables::validate`]
/// (done by `Parser::new`) before execution.
///
/// # Errors
///
/// [`TableError::MalformedBlob`] with the offending byte offset.
pub fn decode_tables(blob: &[u8]) -> Result<ParserTables, TableError> {
    let mut r = Reader { data: blob, at: 0 };
    if r.take(4, "magic")? != MAGIC {
        return Err(TableError::MalformedBlob {
            offset: 0,
            reason: "bad magic",
        });
    }
    if r.u16("version")? != VERSION {
        return Err(TableError::MalformedBlob {
            offset: 4,
            reason: "unsupported version",
        });
    }
    let max_term = r.u16("max term")?;
    let state_count = r.u32("state count")? as usize;
    let tokenizer_count = r.u32("tokenizer count")? as usize;
    let name_count = r.u32("name count")? as usize;
    let dialect_count = r.u32("dialect count")? as usize;

    let mut states = Vec::with_capacity(state_count);
    for _ in 0..state_count {
        let token_group = r.u8("token group")?;
        let skip = r.u32("skip tokenizer")?;
        let always_reduce = r.i32("always reduce")?;
        let default_reduce = r.i32("default reduce")?;
        let n = usize::from(r.u16("tokenizer list")?);
        let mut tokenizers = SmallVec::with_capacity(n);
        for _ in 0..n {
            tokenizers.push(r.u32("tokenizer index")?);
        }
        let n = usize::from(r.u16("action list")?);
        let mut actions = Vec::with_capacity(n);
        for _ in 0..n {
            let term = r.u16("action term")?;
            let action = r.i32("action value")?;
            actions.push((term, action));
        }
        let n = usize::from(r.u16("goto list")?);
        let mut goto = Vec::with_capacity(n);
        for _ in 0..n {
            let term = r.u16("goto term")?;
            let target = r.u32("goto target")?;
            goto.push((term, target));
        }
        let n = usize::from(r.u16("recover list")?);
        let mut recover = Vec::with_capacity(n);
        for _ in 0..n {
            let term = r.u16("recover term")?;
            let target = r.u32("recover target")?;
            recover.push((term, target));
        }
        states.push(ParseState {
            actions: actions.into_boxed_slice(),
            goto: goto.into_boxed_slice(),
            recover: recover.into_boxed_slice(),
            always_reduce,
            default_reduce,
            skip: (skip != NO_SKIP).then_some(skip),
            tokenizers,
            token_group,
            has_shifts: false,
        });
    }

    let mut tokenizers = Vec::with_capacity(tokenizer_count);
    for _ in 0..tokenizer_count {
        let flags = r.u8("tokenizer flags")?;
        let kind = match r.u8("tokenizer kind")? {
            0 => {
                let words = r.u32("dfa length")? as usize;
                let mut data = Vec::with_capacity(words);
                for _ in 0..words {
                    data.push(r.u16("dfa word")?);
                }
                TokenizerKind::Dfa(DfaTable {
                    data: data.into_boxed_slice(),
                })
            }
            1 => TokenizerKind::External(r.u16("external slot")?),
            _ => {
                return Err(TableError::MalformedBlob {
                    offset: r.at - 1,
                    reason: "unknown tokenizer kind",
                })
            }
        };
        tokenizers.push(TokenizerDef {
            kind,
            contextual: flags & 1 != 0,
            fallback: flags & 2 != 0,
            extend: flags & 4 != 0,
        });
    }

    let mut term_names = Vec::with_capacity(name_count);
    for _ in 0..name_count {
        term_names.push(r.string("term name")?);
    }

    let mut dialects = Vec::with_capacity(dialect_count);
    for _ in 0..dialect_count {
        let name = r.string("dialect name")?;
        let n = usize::from(r.u16("dialect terms")?);
        let mut terms = Vec::with_capacity(n);
        for _ in 0..n {
            terms.push(r.u16("dialect term")?);
        }
        dialects.push(DialectSpec {
            name,
            terms: terms.into_boxed_slice(),
        });
    }

    if r.at != blob.len() {
        return Err(TableError::MalformedBlob {
            offset: r.at,
            reason: "trailing bytes",
        });
    }

    let mut tables = ParserTables {
        states: states.into_boxed_slice(),
        tokenizers: tokenizers.into_boxed_slice(),
        term_names: term_names.into_boxed_slice(),
        dialects: dialects.into_boxed_slice(),
        max_term,
    };
    tables.finish();
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = decode_tables(b"NOPE").unwrap_err();
        assert!(matches!(
            err,
            TableError::MalformedBlob {
                reason: "bad magic",
                ..
            }
        ));
    }

    #[test]
    fn rejects_truncation() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&MAGIC);
        blob.extend_from_slice(&VERSION.to_le_bytes());
        let err = decode_tables(&blob).unwrap_err();
        assert!(matches!(err, TableError::MalformedBlob { .. }));
    }
}
