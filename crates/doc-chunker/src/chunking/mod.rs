//! Chunking stages: hybrid chunking, fusion and markdown re-splitting

pub mod fusion;
pub mod hybrid;
pub mod markdown_splitter;

pub use fusion::fuse_texts;
pub use hybrid::{ChunkingBackend, HybridChunker};
pub use markdown_splitter::{chunk_markdowns, clean_markdown_tables, RecursiveMarkdownSplitter};
