//! Tokenizer capability boundary.
//!
//! The vocabulary and byte-pair machinery live outside this crate; components
//! only require an opaque `encode`/`decode` pair, injected explicitly at
//! construction. There is no process-wide default tokenizer.

use crate::types::Token;

/// Opaque text tokenization capability.
///
/// Implementations must be deterministic: the same text always encodes to the
/// same token sequence within a process.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a token sequence.
    fn encode(&self, text: &str) -> Vec<Token>;
    /// Decode a token sequence back into text.
    fn decode(&self, tokens: &[Token]) -> String;
}

/// Character-level tokenizer mapping each `char` to its code point.
///
/// Lossless and dependency-free; used by tests and local smoke runs where a
/// real vocabulary is unnecessary.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        text.chars().map(|ch| ch as Token).collect()
    }

    fn decode(&self, tokens: &[Token]) -> String {
        tokens
            .iter()
            .filter_map(|&token| u32::try_from(token).ok().and_then(char::from_u32))
            .collect()
    }
}
