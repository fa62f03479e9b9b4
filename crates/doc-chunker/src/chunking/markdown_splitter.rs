//! Markdown re-splitting into character-bounded chunks
//!
//! A recursive splitter: the text is cut at the first markdown separator that
//! occurs in it, pieces that fit are merged greedily up to the chunk size with
//! a trailing overlap, and pieces that do not fit are split again with the
//! remaining, finer separators. Separators stay attached to the start of the
//! piece that follows them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Markdown split points, coarsest first (regex syntax)
pub const MARKDOWN_SEPARATORS: [&str; 9] = [
    // Headings
    r"\n#{1,6} ",
    // End of code block
    "```\n",
    // Horizontal rules
    r"\n\*\*\*+\n",
    r"\n---+\n",
    r"\n___+\n",
    // Paragraphs, lines, words, characters
    "\n\n",
    "\n",
    " ",
    "",
];

static SEPARATOR_PATTERNS: Lazy<Vec<Option<Regex>>> = Lazy::new(|| {
    MARKDOWN_SEPARATORS
        .iter()
        .map(|s| (!s.is_empty()).then(|| Regex::new(s).expect("valid separator regex")))
        .collect()
});

static TABLE_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}\|").expect("valid regex"));
static TABLE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}\|").expect("valid regex"));

/// Collapse table padding that inflates character counts
///
/// `---|` becomes `-|` and runs of spaces before a pipe become one space.
pub fn clean_markdown_tables(text: &str) -> String {
    let text = TABLE_DASHES.replace_all(text, "-|");
    TABLE_SPACES.replace_all(&text, " |").into_owned()
}

/// Recursive character splitter tuned for markdown
#[derive(Debug, Clone)]
pub struct RecursiveMarkdownSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveMarkdownSplitter {
    /// Create a splitter; overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than zero"));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunks of at most `chunk_size` characters
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, 0)
    }

    fn split_recursive(&self, text: &str, first_separator: usize) -> Vec<String> {
        // Pick the coarsest remaining separator present in the text.
        let mut separator = MARKDOWN_SEPARATORS.len() - 1;
        for idx in first_separator..MARKDOWN_SEPARATORS.len() {
            match &SEPARATOR_PATTERNS[idx] {
                Some(re) if re.is_match(text) => {
                    separator = idx;
                    break;
                }
                Some(_) => continue,
                None => {
                    separator = idx;
                    break;
                }
            }
        }
        let has_finer = separator + 1 < MARKDOWN_SEPARATORS.len();

        let mut chunks = Vec::new();
        let mut good_splits: Vec<&str> = Vec::new();

        for piece in split_keep_start(text, SEPARATOR_PATTERNS[separator].as_ref()) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }
            if has_finer {
                chunks.extend(self.split_recursive(piece, separator + 1));
            } else {
                chunks.push(piece.to_string());
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits));
        }
        chunks
    }

    /// Greedily join pieces up to the chunk size, carrying an overlap forward
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_pieces(&current) {
                    docs.push(doc);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            current.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Clean and re-split every fused chunk, flattening the results in order
pub fn chunk_markdowns(documents: &[String], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let splitter = RecursiveMarkdownSplitter::new(chunk_size, chunk_overlap)?;
    Ok(documents
        .iter()
        .flat_map(|doc| splitter.split_text(&clean_markdown_tables(doc)))
        .collect())
}

/// Split at every match, keeping each separator at the start of the next piece
fn split_keep_start<'a>(text: &'a str, separator: Option<&Regex>) -> Vec<&'a str> {
    let Some(re) = separator else {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    };

    let mut pieces = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            pieces.push(&text[last..m.start()]);
        }
        last = m.start();
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

fn join_pieces(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clean_markdown_tables() {
        assert_eq!(clean_markdown_tables("|---|------|"), "|-|-|");
        assert_eq!(clean_markdown_tables("| a    | b  |"), "| a | b |");
        assert_eq!(clean_markdown_tables("a - | b"), "a - | b");
        assert_eq!(clean_markdown_tables("---|"), "-|");
        assert_eq!(clean_markdown_tables("-|"), "-|");
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = RecursiveMarkdownSplitter::new(100, 10).unwrap();
        assert_eq!(splitter.split_text("  hello world  "), vec!["hello world"]);
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn test_splits_on_headings_first() {
        let text = "# One\nalpha beta gamma\n# Two\ndelta epsilon zeta";
        let splitter = RecursiveMarkdownSplitter::new(30, 0).unwrap();
        assert_eq!(
            splitter.split_text(text),
            vec!["# One\nalpha beta gamma", "# Two\ndelta epsilon zeta"]
        );
    }

    #[test]
    fn test_word_split_with_overlap() {
        let splitter = RecursiveMarkdownSplitter::new(12, 6).unwrap();
        let chunks = splitter.split_text("aaa bbb ccc ddd eee");
        assert_eq!(chunks, vec!["aaa bbb ccc", "ccc ddd eee"]);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveMarkdownSplitter::new(4, 0).unwrap();
        assert_eq!(splitter.split_text("abcdefghij"), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(RecursiveMarkdownSplitter::new(10, 10).is_err());
        assert!(RecursiveMarkdownSplitter::new(0, 0).is_err());
    }

    #[test]
    fn test_chunk_markdowns_flattens_in_order() {
        let docs = vec!["first doc".to_string(), "| a   | b |\n|---|---|".to_string()];
        let chunks = chunk_markdowns(&docs, 100, 10).unwrap();
        assert_eq!(chunks, vec!["first doc", "| a | b |\n|-|-|"]);
    }

    proptest! {
        #[test]
        fn prop_cleanup_is_idempotent(text in "[-| a\n]{0,64}") {
            let once = clean_markdown_tables(&text);
            prop_assert_eq!(clean_markdown_tables(&once), once);
        }

        #[test]
        fn prop_chunks_fit_budget(
            text in "[a-z#\n ]{0,400}",
            chunk_size in 2usize..80,
            overlap_pct in 0usize..90,
        ) {
            let overlap = chunk_size * overlap_pct / 100;
            let splitter = RecursiveMarkdownSplitter::new(chunk_size, overlap).unwrap();
            for chunk in splitter.split_text(&text) {
                prop_assert!(chunk.chars().count() <= chunk_size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }
}
