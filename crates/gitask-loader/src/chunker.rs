use crate::error::{LoaderError, Result};
use crate::tokenizer::TokenCodec;

pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Split `text` into contiguous, non-overlapping windows of at most
/// `max_tokens` tokens and decode each window on its own.
///
/// Boundaries ignore sentences and syntax. Only the last window may be
/// shorter than `max_tokens`; empty text yields no windows.
///
/// # Errors
///
/// Returns [`LoaderError::InvalidChunkSize`] when `max_tokens` is zero, or a
/// tokenizer error if encoding or decoding fails.
pub fn split_tokens(codec: &TokenCodec, text: &str, max_tokens: usize) -> Result<Vec<String>> {
    if max_tokens == 0 {
        return Err(LoaderError::InvalidChunkSize);
    }
    let ids = codec.encode(text)?;
    ids.chunks(max_tokens)
        .map(|window| codec.decode(window))
        .collect()
}
