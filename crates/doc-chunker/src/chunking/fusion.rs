//! Fusion of short chunks into their predecessor

use crate::tokenizer::TokenCounter;

/// Merge chunks at or below `short_length_threshold` tokens into the previous chunk
///
/// Short chunks are appended to the last emitted chunk, separated by a blank
/// line. The first chunk has no predecessor and is always kept, even when
/// short. Order is preserved.
pub fn fuse_texts(
    texts: Vec<String>,
    short_length_threshold: usize,
    counter: &dyn TokenCounter,
) -> Vec<String> {
    let mut fused: Vec<String> = Vec::with_capacity(texts.len());
    let mut has_merge_target = false;

    for text in texts {
        let token_count = counter.count_tokens(&text);

        match fused.last_mut() {
            Some(previous) if has_merge_target && token_count <= short_length_threshold => {
                previous.push_str("\n\n");
                previous.push_str(&text);
            }
            _ => {
                has_merge_target = !text.is_empty();
                fused.push(text);
            }
        }
    }

    fused
}
