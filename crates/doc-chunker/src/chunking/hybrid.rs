//! Structure-aware chunking under a token ceiling

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tokenizer::TokenCounter;
use crate::types::{DocElement, StructuredDocument};

/// Capability to split a structured document into raw text chunks
pub trait ChunkingBackend {
    fn chunk(&self, document: &StructuredDocument) -> Result<Vec<String>>;
}

/// Groups consecutive elements under the same headings up to a token ceiling
///
/// Headings are not content of their own; they are folded into each chunk as
/// leading context lines. A chunk is serialized as its heading path followed
/// by its elements' markdown, one per line. A single element larger than the
/// ceiling becomes its own chunk, untruncated.
pub struct HybridChunker {
    tokenizer: Arc<dyn TokenCounter>,
    max_tokens: usize,
}

impl HybridChunker {
    pub fn new(tokenizer: Arc<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self {
            tokenizer,
            max_tokens,
        }
    }

    /// Token ceiling per chunk
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn serialize(headings: &[String], group: &[&DocElement]) -> String {
        headings
            .iter()
            .cloned()
            .chain(group.iter().map(|e| e.to_markdown()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ChunkingBackend for HybridChunker {
    fn chunk(&self, document: &StructuredDocument) -> Result<Vec<String>> {
        if self.max_tokens == 0 {
            return Err(Error::chunking(&document.name, "max_tokens must be greater than zero"));
        }

        let mut chunks = Vec::new();
        let mut group: Vec<&DocElement> = Vec::new();

        for element in document.elements.iter().filter(|e| !e.is_heading()) {
            if let Some(first) = group.first() {
                let same_section = first.headings == element.headings;
                let fits = same_section && {
                    let mut candidate = group.clone();
                    candidate.push(element);
                    let text = Self::serialize(&first.headings, &candidate);
                    self.tokenizer.count_tokens(&text) <= self.max_tokens
                };

                if !fits {
                    chunks.push(Self::serialize(&first.headings, &group));
                    group.clear();
                }
            }
            group.push(element);
        }

        if let Some(first) = group.first() {
            chunks.push(Self::serialize(&first.headings, &group));
        }

        tracing::debug!("[{}] Hybrid chunker produced {} chunks", document.name, chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementKind, FileType};

    struct SpaceCounter;

    impl TokenCounter for SpaceCounter {
        fn count_tokens(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn paragraph(text: &str, headings: &[&str]) -> DocElement {
        DocElement::new(ElementKind::Paragraph, text)
            .with_headings(headings.iter().map(|h| h.to_string()).collect())
    }

    fn chunker(max_tokens: usize) -> HybridChunker {
        HybridChunker::new(Arc::new(SpaceCounter), max_tokens)
    }

    #[test]
    fn test_groups_elements_under_ceiling() {
        let doc = StructuredDocument::new(
            "a.md",
            FileType::Markdown,
            vec![
                DocElement::new(ElementKind::Heading { level: 1 }, "Intro"),
                paragraph("one two", &["Intro"]),
                paragraph("three four", &["Intro"]),
                paragraph("five six", &["Intro"]),
            ],
        );

        // "Intro" + 2 paragraphs = 5 tokens, a third would make 7
        let chunks = chunker(5).chunk(&doc).unwrap();
        assert_eq!(chunks, vec!["Intro\none two\nthree four", "Intro\nfive six"]);
    }

    #[test]
    fn test_heading_change_starts_new_chunk() {
        let doc = StructuredDocument::new(
            "a.md",
            FileType::Markdown,
            vec![paragraph("alpha", &["A"]), paragraph("beta", &["B"])],
        );
        let chunks = chunker(100).chunk(&doc).unwrap();
        assert_eq!(chunks, vec!["A\nalpha", "B\nbeta"]);
    }

    #[test]
    fn test_oversized_element_is_emitted_intact() {
        let big = vec!["w"; 50].join(" ");
        let doc = StructuredDocument::new(
            "a.md",
            FileType::Markdown,
            vec![paragraph("small", &[]), paragraph(&big, &[]), paragraph("tail", &[])],
        );

        let chunks = chunker(10).chunk(&doc).unwrap();
        assert_eq!(chunks, vec!["small".to_string(), big, "tail".to_string()]);
    }

    #[test]
    fn test_multi_element_chunks_respect_ceiling() {
        let elements = (0..40)
            .map(|i| paragraph(&vec!["w"; i % 7 + 1].join(" "), &["S"]))
            .collect();
        let doc = StructuredDocument::new("a.md", FileType::Markdown, elements);

        for chunk in chunker(20).chunk(&doc).unwrap() {
            assert!(SpaceCounter.count_tokens(&chunk) <= 20);
        }
    }

    #[test]
    fn test_zero_ceiling_is_an_error() {
        let doc = StructuredDocument::new("a.md", FileType::Markdown, vec![paragraph("x", &[])]);
        assert!(matches!(chunker(0).chunk(&doc), Err(Error::Chunking { .. })));
    }
}
