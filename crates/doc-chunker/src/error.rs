//! Error types for the chunking pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chunking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chunking pipeline errors
///
/// Construction-time variants (`EmptyDocumentSet`, `UnsupportedFileType`,
/// `MixedDocumentTypes`, `TokenizerLoad`, `InvalidModelFormat`, `Config`) are
/// fatal and surface to the caller. `Conversion`, `Chunking` and `Ocr` describe
/// failures confined to one document; the orchestrator records them and moves on.
#[derive(Debug, Error)]
pub enum Error {
    /// No document paths were supplied
    #[error("Provided empty list of documents")]
    EmptyDocumentSet,

    /// A path carries an extension outside the supported set
    #[error("Provided unsupported filetype: {0}")]
    UnsupportedFileType(String),

    /// Paths of more than one supported type in a single session
    #[error("Provided multiple document types: {}", .0.join(", "))]
    MixedDocumentTypes(Vec<String>),

    /// The tokenizer artifact was found but could not be loaded
    #[error("Failed to load tokenizer from {}: {message}. {hint}", .path.display())]
    TokenizerLoad {
        path: PathBuf,
        hint: String,
        message: String,
    },

    /// The tokenizer path matches neither recognized model format
    #[error("No valid model was found at {}. {hint}", .path.display())]
    InvalidModelFormat { path: PathBuf, hint: String },

    /// Converting one document failed
    #[error("Failed to convert '{file}': {message}")]
    Conversion { file: String, message: String },

    /// Chunking one converted document failed
    #[error("Failed to chunk '{file}': {message}")]
    Chunking { file: String, message: String },

    /// OCR engine error
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a conversion error
    pub fn conversion(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a chunking error
    pub fn chunking(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chunking {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an OCR error
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
