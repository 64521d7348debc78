//! # Tokenization
//!
//! The tokenizer interpreter: character streams ([`stream`]), the packed
//! DFA executor ([`dfa`]), token caching and the cross-tokenizer policy
//! ([`cache`]), and the host-provided external tokenizer hook.
//!
//! A parse state names the tokenizers that may run for it, in priority
//! order, plus an optional skip tokenizer for whitespace and comments.
//! Each tokenizer writes at most one token into the stream's working
//! token; the policy for combining them lives in
//! [`cache::TokenCache::get_actions`].

pub mod cache;
pub(crate) mod dfa;
pub mod stream;

pub use cache::CachedToken;
pub use stream::{Input, InputGap, InputStream, StringInput};

use crate::table::Dialect;

/// Parse-side context handed to external tokenizers.
pub struct TokenContext<'a> {
    /// Id of the parse state the requesting head is in.
    pub state: u32,
    /// The active dialect selection.
    pub dialect: &'a Dialect,
}

/// A host-provided tokenizer. Implementations inspect the stream with
/// [`InputStream::current`] / [`InputStream::peek`] /
/// [`InputStream::advance`] and report a match by calling
/// [`InputStream::accept_token`]; not accepting anything means "no token
/// here".
pub trait ExternalTokenizer: Send + Sync {
    fn token(&self, stream: &mut InputStream<'_>, ctx: &TokenContext<'_>);
}
