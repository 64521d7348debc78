//! # Skein
//!
//! A table-driven generalized-LR (GLR) parser runtime with incremental
//! reparsing.
//!
//! Skein executes parse tables compiled offline by a grammar generator: a
//! packed action/goto/recovery table per state, packed tokenizer DFAs, and
//! host-provided external tokenizers. On top of those it provides:
//!
//! - **Character streams** over arbitrary chunked input, with gap elision
//!   for mixed-language documents and per-token lookahead tracking
//!   ([`lexer`]).
//! - **Non-deterministic parsing**: conflicting actions fork the parse
//!   stack; heads merge, compete on score, and stay bounded ([`parser`]).
//! - **Soft error recovery**: malformed input yields a tree with error
//!   nodes, never a failed parse.
//! - **A dual-representation syntax tree** — structural nodes plus packed
//!   buffers for dense leaves — with cursors that hide the split
//!   ([`syntax`]).
//! - **Incremental reuse**: feed the previous tree and an edit description
//!   and unchanged subtrees are spliced into the new parse
//!   ([`incremental`]).
//!
//! ## Quick start
//!
//! ```
//! use skein::testing::{GrammarBuilder, TokenPattern};
//!
//! // Stand-in for the offline generator: S matches one or more `a`s.
//! let mut g = GrammarBuilder::new();
//! let a = g.token("a", TokenPattern::literal("a"));
//! let s = g.nonterminal("S");
//! let r = g.hidden_nonterminal("R");
//! g.rule(s, vec![r.into()]);
//! g.rule(r, vec![r.into(), a.into()]);
//! g.rule(r, vec![a.into()]);
//! let built = g.build(s).unwrap();
//!
//! let parser = built.parser();
//! let result = parser.parse("aaa").unwrap();
//! assert_eq!(result.tree.to_sexpr(parser.tables()), "S(a,a,a)");
//! ```

pub mod error;
pub mod incremental;
pub mod lexer;
pub mod parser;
pub mod syntax;
pub mod table;
pub mod testing;

pub use error::{InputError, ParseError, TableError};
pub use incremental::{ChangedRange, FragmentMap};
pub use lexer::{CachedToken, ExternalTokenizer, Input, InputGap, InputStream, StringInput, TokenContext};
pub use parser::{ConflictPreference, Parse, ParseMetrics, ParseResult, Parser, ParserConfig};
pub use syntax::cursor::TreeCursor;
pub use syntax::{Tree, TreeBuffer, TreeChild};
pub use table::{binary::decode_tables, ParserTables, Term, TERM_EOF, TERM_ERR};
