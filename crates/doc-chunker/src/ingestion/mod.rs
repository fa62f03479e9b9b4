//! Document ingestion: parsing, OCR and batch conversion

pub mod converter;
pub mod ocr;
pub mod parser;

pub use converter::{export_documents, ConversionBackend, DocumentConverter, NativeConverter};
pub use ocr::{resolve_ocr_engine, EasyOcr, EasyOcrOptions, OcrEngine, TesseractOcr};
pub use parser::FileParser;

/// Default directory for exported conversion artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "converted-artifacts";
