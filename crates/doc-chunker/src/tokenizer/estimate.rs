//! Coarse conversions between word, token and character counts
//!
//! Planning heuristics only; the two directions do not round-trip.

/// Estimate tokens from words (1 word ~ 1.3 tokens), rounded down
pub fn words_to_tokens(word_count: usize) -> usize {
    word_count.saturating_mul(13) / 10
}

/// Estimate characters from tokens (1 token ~ 4 English characters)
pub fn tokens_to_chars(token_count: usize) -> usize {
    token_count.saturating_mul(4)
}
