//! # Error Types
//!
//! Error types for table loading, input access, and parsing.
//!
//! Grammatical errors in the parsed text are never surfaced here: recovery
//! encodes them into the tree as error nodes (see [`crate::parser`]). The
//! types in this module cover the *structural* failures — inconsistent
//! tables and host input errors — plus the umbrella [`ParseError`] the
//! parse loop returns.
//!
//! When the `diagnostics` feature is enabled, errors integrate with
//! [`miette`] for rich reporting.

use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// A structural problem in a parser table: out-of-range references or a
/// malformed binary blob. These are programming errors on the generator
/// side and fail loudly, carrying the offending state where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum TableError {
    #[error("state {state} referenced, but the table has {count} states")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::unknown_state)))]
    UnknownState { state: u32, count: u32 },

    #[error("state {state} holds an out-of-range action {action}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::bad_action)))]
    BadAction { state: u32, action: i32 },

    #[error("state {state} has no goto for term {term} after a reduction")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::missing_goto)))]
    MissingGoto { state: u32, term: u16 },

    #[error("state {state} references tokenizer {index}, but only {count} exist")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::bad_tokenizer)))]
    BadTokenizer { state: u32, index: u32, count: u32 },

    #[error("external tokenizer slot {slot} has no bound implementation ({bound} bound)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::unbound_external)))]
    UnboundExternal { slot: u16, bound: usize },

    #[error("tokenizer {index} has a malformed DFA table: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::bad_dfa)))]
    BadDfa { index: u32, reason: &'static str },

    #[error("unknown dialect {name:?}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::unknown_dialect)))]
    UnknownDialect { name: String },

    #[error("malformed table blob at byte {offset}: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(skein::table::malformed_blob)))]
    MalformedBlob { offset: usize, reason: &'static str },
}

/// An error reported by the host [`Input`](crate::lexer::Input) while the
/// stream fetched a chunk. The parse is abandoned and the error propagated
/// verbatim.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(skein::input::read_failed)))]
#[error("input read failed at offset {offset}")]
pub struct InputError {
    /// Byte offset of the failed read.
    pub offset: u32,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl InputError {
    pub fn new(
        offset: u32,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            offset,
            source: source.into(),
        }
    }
}

/// Fatal parse failure. Malformed *input text* never produces one of these;
/// only broken tables or a failing host input do.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Table(#[from] TableError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Input(#[from] InputError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_error_names_the_state() {
        let err = TableError::MissingGoto { state: 7, term: 3 };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains("goto"));
    }

    #[test]
    fn input_error_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = InputError::new(42, io);
        assert_eq!(err.offset, 42);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn parse_error_converts() {
        let err: ParseError = TableError::UnknownState { state: 1, count: 1 }.into();
        assert!(matches!(err, ParseError::Table(_)));
    }
}
