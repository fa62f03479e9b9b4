//! Configuration for a chunking session

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tokenizer::{tokens_to_chars, words_to_tokens};

/// Default fusion threshold, tuned for the Mixtral tokenizer
pub const DEFAULT_SHORT_LENGTH_THRESHOLD: usize = 130;
/// Default Hybrid Chunker ceiling in tokens
pub const DEFAULT_MAX_TOKENS: usize = 500;
/// Default overlap between re-split chunks, in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Session configuration, immutable for the lifetime of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Path to the model artifact the tokenizer is resolved from
    pub tokenizer_model_name_or_path: PathBuf,
    /// Pre-downloaded conversion/OCR model artifacts
    #[serde(alias = "docling_model_path")]
    pub conversion_model_path: Option<PathBuf>,
    /// Context window of the serving model (tokens)
    pub server_ctx_size: usize,
    /// Target words per final chunk
    pub chunk_word_count: usize,
    /// Hybrid Chunker ceiling (tokens)
    pub max_tokens: usize,
    /// Chunks at or below this token count are fused into their predecessor
    pub short_length_threshold: usize,
    /// Overlap between consecutive re-split chunks (characters)
    pub chunk_overlap: usize,
    /// OCR configuration
    pub ocr: OcrConfig,
    /// Accelerator configuration
    pub accelerator: AcceleratorConfig,
    /// Export side channel configuration
    pub export: ExportConfig,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            tokenizer_model_name_or_path: PathBuf::new(),
            conversion_model_path: None,
            server_ctx_size: 4096,
            chunk_word_count: 1024,
            max_tokens: DEFAULT_MAX_TOKENS,
            short_length_threshold: DEFAULT_SHORT_LENGTH_THRESHOLD,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            ocr: OcrConfig::default(),
            accelerator: AcceleratorConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ChunkerConfig {
    /// Create a config for the given tokenizer path with default settings
    pub fn new(tokenizer_model_name_or_path: impl Into<PathBuf>) -> Self {
        Self {
            tokenizer_model_name_or_path: tokenizer_model_name_or_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Character budget of the Markdown Re-splitter
    pub fn char_budget(&self) -> usize {
        tokens_to_chars(words_to_tokens(self.chunk_word_count))
    }

    /// Directory holding conversion/OCR model artifacts
    ///
    /// Falls back to the user cache directory when no path is configured.
    pub fn models_dir(&self) -> PathBuf {
        self.conversion_model_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("doc-chunker")
                .join("models")
        })
    }

    /// Whether models were supplied on disk rather than fetched on demand
    pub fn has_local_models(&self) -> bool {
        self.conversion_model_path.is_some()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_word_count == 0 {
            return Err(Error::config("chunk_word_count must be greater than zero"));
        }
        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than zero"));
        }
        let budget = self.char_budget();
        if self.chunk_overlap >= budget {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than the chunk character budget ({})",
                self.chunk_overlap, budget
            )));
        }

        // The two size limits are configured independently; only flag disagreement.
        let budget_tokens = words_to_tokens(self.chunk_word_count);
        if self.max_tokens > budget_tokens {
            tracing::warn!(
                "max_tokens ({}) exceeds the re-split budget of ~{} tokens ({} words); \
                 hybrid chunks will be re-split",
                self.max_tokens,
                budget_tokens,
                self.chunk_word_count
            );
        }

        Ok(())
    }
}

/// OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Try to resolve an OCR engine for scanned PDFs
    pub enabled: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Compute device preference for conversion models
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorDevice {
    /// Use a GPU when one is available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl AcceleratorDevice {
    /// Whether this device may run on a GPU
    pub fn allows_gpu(&self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

/// Accelerator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// Preferred device
    pub device: AcceleratorDevice,
}

impl AcceleratorConfig {
    /// Device after environment overrides
    ///
    /// MPS acceleration is unavailable on CI macOS runners, so `CI` forces CPU there.
    pub fn effective_device(&self) -> AcceleratorDevice {
        let is_ci = std::env::var_os("CI").is_some();
        Self::resolve_device(self.device, is_ci, cfg!(target_os = "macos"))
    }

    fn resolve_device(device: AcceleratorDevice, is_ci: bool, is_macos: bool) -> AcceleratorDevice {
        if is_ci && is_macos {
            AcceleratorDevice::Cpu
        } else {
            device
        }
    }
}

/// Export side channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Write `<stem>.json` and `<stem>.md` for each converted document
    pub enabled: bool,
    /// Output directory, created on demand
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from(crate::ingestion::DEFAULT_ARTIFACTS_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChunkerConfig::default();
        assert_eq!(config.server_ctx_size, 4096);
        assert_eq!(config.chunk_word_count, 1024);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.short_length_threshold, 130);
        assert_eq!(config.chunk_overlap, 100);
        assert!(config.ocr.enabled);
        assert!(!config.export.enabled);
    }

    #[test]
    fn test_char_budget() {
        // 1024 words -> 1331 tokens -> 5324 chars
        assert_eq!(ChunkerConfig::default().char_budget(), 5324);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ChunkerConfig::from_toml_str(
            r#"
            tokenizer_model_name_or_path = "/models/granite"
            docling_model_path = "/models/docling"
            chunk_word_count = 500

            [ocr]
            enabled = false

            [accelerator]
            device = "cpu"
            "#,
        )
        .unwrap();

        assert_eq!(config.tokenizer_model_name_or_path, PathBuf::from("/models/granite"));
        assert_eq!(config.conversion_model_path, Some(PathBuf::from("/models/docling")));
        assert_eq!(config.chunk_word_count, 500);
        assert_eq!(config.max_tokens, 500);
        assert!(!config.ocr.enabled);
        assert_eq!(config.accelerator.device, AcceleratorDevice::Cpu);
    }

    #[test]
    fn test_validate_rejects_overlap_above_budget() {
        let config = ChunkerConfig {
            chunk_word_count: 10,
            chunk_overlap: 100,
            ..ChunkerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = ChunkerConfig {
            chunk_word_count: 0,
            ..ChunkerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ChunkerConfig {
            max_tokens: 0,
            ..ChunkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ci_forces_cpu_on_macos_only() {
        let gpu = AcceleratorDevice::Mps;
        assert_eq!(AcceleratorConfig::resolve_device(gpu, true, true), AcceleratorDevice::Cpu);
        assert_eq!(AcceleratorConfig::resolve_device(gpu, true, false), gpu);
        assert_eq!(AcceleratorConfig::resolve_device(gpu, false, true), gpu);
    }

    #[test]
    fn test_models_dir_prefers_configured_path() {
        let config = ChunkerConfig {
            conversion_model_path: Some(PathBuf::from("/opt/models")),
            ..ChunkerConfig::default()
        };
        assert_eq!(config.models_dir(), PathBuf::from("/opt/models"));
        assert!(config.has_local_models());
    }
}
