//! Document Chunker orchestrator
//!
//! Sequences conversion, hybrid chunking, fusion and markdown re-splitting
//! over a homogeneous batch of documents:
//!
//! ```text
//! Configured -> Converting -> Chunking (per document) -> Done
//! ```

use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunking::{chunk_markdowns, fuse_texts, ChunkingBackend, HybridChunker};
use crate::config::ChunkerConfig;
use crate::error::{Error, Result};
use crate::ingestion::{export_documents, DocumentConverter};
use crate::tokenizer::{HfTokenizer, TokenCounter};
use crate::types::{ConversionSummary, FileType, StructuredDocument};

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Configured,
    Converting,
    Chunking,
    Done,
}

/// A document excluded from the output, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one chunking session
#[derive(Debug, Clone, Serialize)]
pub struct ChunkingReport {
    /// Final chunks, in input document order then chunk order
    pub chunks: Vec<String>,
    /// Conversion success/failure counts
    pub conversion: ConversionSummary,
    /// Documents that failed to convert
    pub conversion_failures: Vec<DocumentFailure>,
    /// Documents that converted but failed to chunk
    pub chunking_failures: Vec<DocumentFailure>,
    /// Where conversion artifacts were exported, if enabled
    pub export_dir: Option<PathBuf>,
}

/// Group paths by supported file type
///
/// Fails on the first path whose extension is not supported.
pub fn split_docs_by_filetype(paths: &[PathBuf]) -> Result<BTreeMap<FileType, Vec<PathBuf>>> {
    let mut by_type: BTreeMap<FileType, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let file_type = FileType::from_path(path)
            .ok_or_else(|| Error::UnsupportedFileType(path.display().to_string()))?;
        by_type.entry(file_type).or_default().push(path.clone());
    }
    Ok(by_type)
}

/// The single file type of a non-empty, homogeneous batch
fn resolve_file_type(paths: &[PathBuf]) -> Result<FileType> {
    if paths.is_empty() {
        return Err(Error::EmptyDocumentSet);
    }

    let by_type = split_docs_by_filetype(paths)?;
    let mut types = by_type.keys().copied();
    match (types.next(), types.next()) {
        (Some(file_type), None) => Ok(file_type),
        _ => Err(Error::MixedDocumentTypes(
            by_type.keys().map(|t| t.suffix().to_string()).collect(),
        )),
    }
}

/// Chunks a batch of same-type documents into bounded text chunks
pub struct DocumentChunker {
    document_paths: Vec<PathBuf>,
    file_type: FileType,
    config: ChunkerConfig,
    tokenizer: Arc<dyn TokenCounter>,
    converter: OnceCell<DocumentConverter>,
    chunker: Box<dyn ChunkingBackend>,
    state: PipelineState,
}

impl DocumentChunker {
    /// Validate the batch and configuration, then load the tokenizer
    ///
    /// The document converter is built on first `run()`.
    pub fn new(document_paths: Vec<PathBuf>, config: ChunkerConfig) -> Result<Self> {
        let file_type = resolve_file_type(&document_paths)?;
        config.validate()?;

        let tokenizer: Arc<dyn TokenCounter> =
            Arc::new(HfTokenizer::from_model_path(&config.tokenizer_model_name_or_path)?);
        let chunker = Box::new(HybridChunker::new(tokenizer.clone(), config.max_tokens));

        tracing::debug!(
            "Chunking session configured for {} {} documents",
            document_paths.len(),
            file_type.display_name()
        );

        Ok(Self {
            document_paths,
            file_type,
            config,
            tokenizer,
            converter: OnceCell::new(),
            chunker,
            state: PipelineState::Configured,
        })
    }

    /// Build with injected components
    pub fn with_components(
        document_paths: Vec<PathBuf>,
        config: ChunkerConfig,
        tokenizer: Arc<dyn TokenCounter>,
        converter: DocumentConverter,
        chunker: Box<dyn ChunkingBackend>,
    ) -> Result<Self> {
        let file_type = resolve_file_type(&document_paths)?;
        config.validate()?;

        let cell = OnceCell::new();
        if cell.set(converter).is_err() {
            return Err(Error::config("converter already initialized"));
        }

        Ok(Self {
            document_paths,
            file_type,
            config,
            tokenizer,
            converter: cell,
            chunker,
            state: PipelineState::Configured,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn document_paths(&self) -> &[PathBuf] {
        &self.document_paths
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Token count of `text` under the session tokenizer
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count_tokens(text)
    }

    /// Convert and chunk every document
    ///
    /// Per-document conversion and chunking failures are recorded in the
    /// report; only a repeated call is an error.
    pub fn run(&mut self) -> Result<ChunkingReport> {
        if self.state != PipelineState::Configured {
            return Err(Error::config(format!(
                "chunking session already ran (state: {:?})",
                self.state
            )));
        }

        self.transition(PipelineState::Converting);
        let results = {
            let config = &self.config;
            let converter = self
                .converter
                .get_or_init(|| DocumentConverter::from_config(config));
            converter.convert_all(&self.document_paths)
        };

        let conversion = ConversionSummary::from_results(&results);
        let conversion_failures: Vec<_> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| DocumentFailure {
                path: r.input.clone(),
                reason: r.error.clone().unwrap_or_default(),
            })
            .collect();

        let export_dir = if self.config.export.enabled {
            match export_documents(&results, &self.config.export.dir) {
                Ok(dir) => Some(dir),
                Err(e) => {
                    tracing::warn!(
                        "Failed to export converted documents to {}: {}",
                        self.config.export.dir.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        self.transition(PipelineState::Chunking);
        let mut chunks = Vec::new();
        let mut chunking_failures = Vec::new();

        for doc in results.iter().filter_map(|r| r.document.as_ref()) {
            match self.chunk_document(doc) {
                Ok(doc_chunks) => chunks.extend(doc_chunks),
                Err(e) => {
                    tracing::error!("[{}] Error chunking document: {}", doc.name, e);
                    chunking_failures.push(DocumentFailure {
                        path: doc.source.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.transition(PipelineState::Done);
        tracing::info!(
            "Produced {} chunks from {} documents",
            chunks.len(),
            conversion.success_count - chunking_failures.len()
        );

        Ok(ChunkingReport {
            chunks,
            conversion,
            conversion_failures,
            chunking_failures,
            export_dir,
        })
    }

    /// Run and return only the final chunks
    pub fn chunk_documents(&mut self) -> Result<Vec<String>> {
        Ok(self.run()?.chunks)
    }

    /// Hybrid chunking, fusion and re-splitting for one document
    fn chunk_document(&self, doc: &StructuredDocument) -> Result<Vec<String>> {
        let raw = self.chunker.chunk(doc)?;

        let fused = fuse_texts(raw, self.config.short_length_threshold, self.tokenizer.as_ref());
        tracing::debug!("[{}] {} chunks after fusion", doc.name, fused.len());

        let finals = chunk_markdowns(&fused, self.config.char_budget(), self.config.chunk_overlap)
            .map_err(|e| Error::chunking(&doc.name, e.to_string()))?;
        tracing::debug!("[{}] {} final chunks", doc.name, finals.len());

        Ok(finals)
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Whether `path` has a supported document extension
pub fn is_supported_document(path: &Path) -> bool {
    FileType::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_split_docs_by_filetype() {
        let grouped = split_docs_by_filetype(&paths(&["a.pdf", "b.md", "c.PDF"])).unwrap();
        assert_eq!(grouped[&FileType::Pdf], paths(&["a.pdf", "c.PDF"]));
        assert_eq!(grouped[&FileType::Markdown], paths(&["b.md"]));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = split_docs_by_filetype(&paths(&["a.md", "notes.txt"])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(p) if p == "notes.txt"));
    }

    #[test]
    fn test_resolve_file_type() {
        assert_eq!(resolve_file_type(&paths(&["a.md", "b.md"])).unwrap(), FileType::Markdown);
        assert!(matches!(resolve_file_type(&[]), Err(Error::EmptyDocumentSet)));
        match resolve_file_type(&paths(&["a.pdf", "b.md"])) {
            Err(Error::MixedDocumentTypes(types)) => assert_eq!(types, vec![".pdf", ".md"]),
            other => panic!("expected mixed types, got {:?}", other.map(|t| t.display_name())),
        }
    }

    #[test]
    fn test_mixed_types_fail_before_tokenizer_load() {
        // The tokenizer path does not exist; the batch check must fail first.
        let config = ChunkerConfig::new("/nonexistent/model");
        let err = DocumentChunker::new(paths(&["a.pdf", "b.md"]), config).err().unwrap();
        assert!(matches!(err, Error::MixedDocumentTypes(_)));
    }

    #[test]
    fn test_missing_tokenizer_is_fatal() {
        let config = ChunkerConfig::new("/nonexistent/model");
        let err = DocumentChunker::new(paths(&["a.md"]), config).err().unwrap();
        assert!(matches!(err, Error::InvalidModelFormat { .. }));
    }

    #[test]
    fn test_is_supported_document() {
        assert!(is_supported_document(Path::new("x/y.md")));
        assert!(!is_supported_document(Path::new("x/y.docx")));
    }
}
