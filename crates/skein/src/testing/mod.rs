//! # Test Support
//!
//! Utilities the integration tests and benches use in place of the
//! offline grammar generator: an SLR(1) table builder that keeps conflicts
//! (so ambiguous grammars exercise the GLR machinery), a token-DFA
//! builder, a binary table encoder for loader round-trips, and a chunked
//! input for stream cache tests.

pub mod encode;
pub mod grammar;
pub mod input;

pub use encode::encode_tables;
pub use grammar::{BuiltGrammar, GrammarBuilder, GrammarError, NtId, Symbol, TokenId, TokenPattern};
pub use input::ChunkedInput;
