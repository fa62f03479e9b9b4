//! Document conversion: backends, batch conversion and artifact export

use once_cell::unsync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use super::ocr::{default_ocr_candidates, resolve_ocr_engine, OcrEngine};
use super::parser::FileParser;
use crate::config::ChunkerConfig;
use crate::error::{Error, Result};
use crate::types::{ConversionResult, ConversionSummary, FileType, StructuredDocument};

/// Capability to convert one source file into a structured document
pub trait ConversionBackend {
    fn convert(&self, path: &Path, file_type: FileType) -> Result<StructuredDocument>;
}

/// In-process conversion with optional OCR for image-only PDFs
pub struct NativeConverter {
    ocr_candidates: Vec<Box<dyn OcrEngine>>,
    ocr_engine: OnceCell<Option<usize>>,
}

impl NativeConverter {
    /// Converter without OCR
    pub fn new() -> Self {
        Self::with_ocr(Vec::new())
    }

    /// Converter that resolves an OCR engine from `candidates` on first need
    pub fn with_ocr(ocr_candidates: Vec<Box<dyn OcrEngine>>) -> Self {
        Self {
            ocr_candidates,
            ocr_engine: OnceCell::new(),
        }
    }

    /// Build from session configuration
    pub fn from_config(config: &ChunkerConfig) -> Self {
        if !config.ocr.enabled {
            tracing::info!("OCR disabled by configuration");
            return Self::new();
        }

        let models_dir = config.models_dir();
        if config.has_local_models() {
            tracing::info!("Found conversion models at {}", models_dir.display());
        } else {
            tracing::info!(
                "No conversion model path set; OCR models will be fetched into {} on first use",
                models_dir.display()
            );
        }
        Self::with_ocr(default_ocr_candidates(config))
    }

    /// OCR engine for this session, probed once
    fn ocr(&self) -> Option<&dyn OcrEngine> {
        let idx = (*self
            .ocr_engine
            .get_or_init(|| resolve_ocr_engine(&self.ocr_candidates)))?;
        self.ocr_candidates.get(idx).map(|e| e.as_ref())
    }

    fn convert_pdf(&self, path: &Path, name: &str, data: &[u8]) -> Result<StructuredDocument> {
        let pages = FileParser::extract_pdf_pages(name, data)?;
        let total_pages = FileParser::pdf_page_count(data).or(Some(pages.len() as u32));

        if pages.iter().any(|p| !p.trim().is_empty()) {
            let elements = FileParser::elements_from_pages(&pages);
            return Ok(StructuredDocument::new(path, FileType::Pdf, elements).with_total_pages(total_pages));
        }

        let Some(engine) = self.ocr() else {
            return Err(Error::conversion(
                name,
                "PDF has no extractable text and no OCR engine is available",
            ));
        };

        tracing::info!("[{}] No text layer found, running {} OCR", name, engine.name());
        let pages = engine
            .recognize_pdf(data)
            .map_err(|e| Error::conversion(name, e.to_string()))?;
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::conversion(name, "OCR produced no text"));
        }

        let elements = FileParser::elements_from_pages(&pages);
        Ok(StructuredDocument::new(path, FileType::Pdf, elements)
            .with_total_pages(total_pages)
            .with_ocr(true))
    }
}

impl Default for NativeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionBackend for NativeConverter {
    fn convert(&self, path: &Path, file_type: FileType) -> Result<StructuredDocument> {
        let name = display_name(path);
        let data = fs::read(path).map_err(|e| Error::conversion(&name, e.to_string()))?;

        let doc = match file_type {
            FileType::Markdown => {
                FileParser::parse_markdown(path, &String::from_utf8_lossy(&data))
            }
            FileType::Pdf => self.convert_pdf(path, &name, &data)?,
        };

        if doc.is_empty() {
            return Err(Error::conversion(&name, "Document contains no text"));
        }
        Ok(doc)
    }
}

/// Document Converter: runs a backend over a homogeneous batch
pub struct DocumentConverter {
    backend: Box<dyn ConversionBackend>,
}

impl DocumentConverter {
    /// Native backend configured from the session
    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::with_backend(Box::new(NativeConverter::from_config(config)))
    }

    pub fn with_backend(backend: Box<dyn ConversionBackend>) -> Self {
        Self { backend }
    }

    /// Convert every path; individual failures are recorded, never raised
    pub fn convert_all(&self, paths: &[PathBuf]) -> Vec<ConversionResult> {
        let results: Vec<_> = paths.iter().map(|p| self.convert_one(p)).collect();

        let summary = ConversionSummary::from_results(&results);
        tracing::info!(
            "Processed {} docs, of which {} failed",
            summary.total(),
            summary.failure_count
        );
        results
    }

    fn convert_one(&self, path: &Path) -> ConversionResult {
        let name = display_name(path);
        let Some(file_type) = FileType::from_path(path) else {
            let err = Error::UnsupportedFileType(name.clone());
            tracing::warn!("[{}] {}", name, err);
            return ConversionResult::failure(path, err.to_string());
        };

        match self.backend.convert(path, file_type) {
            Ok(doc) => {
                tracing::debug!("[{}] Converted into {} elements", name, doc.elements.len());
                ConversionResult::success(doc)
            }
            Err(e) => {
                tracing::warn!("[{}] Document failed to convert: {}", name, e);
                ConversionResult::failure(path, e.to_string())
            }
        }
    }
}

/// Write `<stem>.json` and `<stem>.md` for each successful conversion
pub fn export_documents(results: &[ConversionResult], dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    for result in results {
        match &result.document {
            Some(doc) if result.is_success() => {
                let stem = doc.stem();
                fs::write(dir.join(format!("{}.json", stem)), doc.export_to_json()?)?;
                fs::write(dir.join(format!("{}.md", stem)), doc.export_to_markdown())?;
            }
            _ => {
                tracing::info!(
                    "[{}] Document failed to convert, nothing exported",
                    display_name(result.input())
                );
            }
        }
    }

    let summary = ConversionSummary::from_results(results);
    tracing::info!(
        "Exported {} converted docs to {}",
        summary.success_count,
        dir.display()
    );
    Ok(dir.to_path_buf())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
