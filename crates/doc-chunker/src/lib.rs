//! Doc Chunker - document conversion and chunking for model training data
//!
//! Converts PDF and Markdown documents into structured form, splits them into
//! coherent chunks under a token ceiling, fuses fragments that are too short to
//! stand alone and re-splits the result into character-bounded final chunks.
//!
//! # Pipeline
//!
//! ```text
//! paths -> DocumentConverter -> HybridChunker -> fuse_texts -> chunk_markdowns -> chunks
//! ```
//!
//! # Example
//!
//! ```no_run
//! use doc_chunker::{ChunkerConfig, DocumentChunker};
//!
//! let config = ChunkerConfig::new("models/granite-7b-lab");
//! let mut chunker = DocumentChunker::new(vec!["docs/guide.md".into()], config)?;
//! let report = chunker.run()?;
//! println!("{} chunks", report.chunks.len());
//! # Ok::<(), doc_chunker::Error>(())
//! ```

pub mod chunking;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod tokenizer;
pub mod types;

pub use chunking::{chunk_markdowns, fuse_texts, ChunkingBackend, HybridChunker};
pub use config::ChunkerConfig;
pub use error::{Error, Result};
pub use ingestion::{ConversionBackend, DocumentConverter};
pub use pipeline::{ChunkingReport, DocumentChunker, DocumentFailure, PipelineState};
pub use tokenizer::{HfTokenizer, TokenCounter, WordTokenCounter};
pub use types::{ConversionResult, ConversionSummary, FileType, StructuredDocument};
