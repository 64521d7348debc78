//! Chunked test input, for exercising the stream's chunk-cache rotation.

use crate::error::InputError;
use crate::lexer::Input;

/// An [`Input`] that serves fixed-size chunks and counts how often the host
/// was asked for one.
pub struct ChunkedInput {
    text: String,
    chunk_size: usize,
    chunk_calls: usize,
}

impl ChunkedInput {
    #[must_use]
    pub fn new(text: &str, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunks must be non-empty");
        Self {
            text: text.to_string(),
            chunk_size,
            chunk_calls: 0,
        }
    }

    /// How many chunk fetches the stream has issued.
    #[must_use]
    pub const fn chunk_calls(&self) -> usize {
        self.chunk_calls
    }
}

impl Input for ChunkedInput {
    fn len(&self) -> u32 {
        u32::try_from(self.text.len()).unwrap_or(u32::MAX)
    }

    fn chunk(&mut self, from: u32) -> Result<&str, InputError> {
        self.chunk_calls += 1;
        let from = from as usize;
        let mut to = usize::min(from + self.chunk_size, self.text.len());
        // Stay on a character boundary.
        while to < self.text.len() && !self.text.is_char_boundary(to) {
            to += 1;
        }
        Ok(&self.text[from..to])
    }
}
