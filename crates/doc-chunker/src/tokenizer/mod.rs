//! Token counting: estimators, model format detection and the tokenizer adapter

mod estimate;
pub mod model_format;

pub use estimate::{tokens_to_chars, words_to_tokens};
pub use model_format::ModelFormat;

use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Capability to count subword tokens in arbitrary text
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to
    fn count_tokens(&self, text: &str) -> usize;
}

/// Tokenizer resolved from a pretrained model artifact
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    source: PathBuf,
    format: ModelFormat,
}

impl HfTokenizer {
    /// Resolve a tokenizer from a safetensors directory or a GGUF file
    pub fn from_model_path(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();

        let (format, tokenizer_file, hint) = match ModelFormat::detect(model_path) {
            Some(ModelFormat::Safetensors) => (
                ModelFormat::Safetensors,
                model_path.join("tokenizer.json"),
                format!(
                    "Please re-download the model repository {} and try again",
                    model_path.display()
                ),
            ),
            Some(ModelFormat::Gguf) => {
                let model_dir = model_path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let model_filename = model_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (
                    ModelFormat::Gguf,
                    model_dir.join("tokenizer.json"),
                    format!(
                        "Please re-download {} (with its tokenizer.json) from repository {} and try again",
                        model_filename,
                        model_dir.display()
                    ),
                )
            }
            None => {
                let err = Error::InvalidModelFormat {
                    path: model_path.to_path_buf(),
                    hint: "Please provide a path to a safetensors model directory or a GGUF model file."
                        .to_string(),
                };
                tracing::error!("{}", err);
                return Err(err);
            }
        };

        let tokenizer = Tokenizer::from_file(&tokenizer_file).map_err(|e| {
            let err = Error::TokenizerLoad {
                path: model_path.to_path_buf(),
                hint,
                message: e.to_string(),
            };
            tracing::error!("{}", err);
            err
        })?;

        tracing::info!("Successfully loaded tokenizer from: {}", model_path.display());

        Ok(Self {
            tokenizer,
            source: model_path.to_path_buf(),
            format,
        })
    }

    /// Path the tokenizer was resolved from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Format of the model artifact
    pub fn format(&self) -> ModelFormat {
        self.format
    }
}

impl TokenCounter for HfTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::warn!("Tokenization failed, estimating from words: {}", e);
                WordTokenCounter.count_tokens(text)
            }
        }
    }
}

/// Approximate counter: Unicode words scaled by the words-to-tokens ratio
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenCounter;

impl TokenCounter for WordTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        words_to_tokens(text.unicode_words().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_word_counter() {
        assert_eq!(WordTokenCounter.count_tokens(""), 0);
        // 10 words -> 13 tokens
        assert_eq!(
            WordTokenCounter.count_tokens("one two three four five six seven eight nine ten"),
            13
        );
    }

    /// Whitespace-split word-level tokenizer over `vocab`
    fn word_level_json(vocab: &[&str], unk: &str) -> String {
        let vocab: serde_json::Map<String, serde_json::Value> = vocab
            .iter()
            .enumerate()
            .map(|(id, word)| (word.to_string(), id.into()))
            .collect();
        serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": vocab, "unk_token": unk }
        })
        .to_string()
    }

    fn safetensors_dir(tokenizer_json: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        fs::write(dir.path().join("tokenizer.json"), tokenizer_json).unwrap();
        fs::write(dir.path().join("tokenizer_config.json"), "{}").unwrap();
        fs::write(dir.path().join("model.safetensors"), b"weights").unwrap();
        dir
    }

    #[test]
    fn test_count_tokens_from_safetensors_dir() {
        let dir = safetensors_dir(&word_level_json(&["[UNK]", "a", "b", "c"], "[UNK]"));

        let tokenizer = HfTokenizer::from_model_path(dir.path()).unwrap();
        assert_eq!(tokenizer.format(), ModelFormat::Safetensors);
        assert_eq!(tokenizer.source(), dir.path());
        assert_eq!(tokenizer.count_tokens("a b c"), 3);
        assert_eq!(tokenizer.count_tokens("a zebra c"), 3);
        assert_eq!(tokenizer.count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_from_gguf_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("granite.gguf");
        fs::write(&file, b"GGUF\x03\x00\x00\x00").unwrap();
        fs::write(
            dir.path().join("tokenizer.json"),
            word_level_json(&["[UNK]", "a", "b", "c"], "[UNK]"),
        )
        .unwrap();

        let tokenizer = HfTokenizer::from_model_path(&file).unwrap();
        assert_eq!(tokenizer.format(), ModelFormat::Gguf);
        assert_eq!(tokenizer.count_tokens("a b c"), 3);
    }

    #[test]
    fn test_encode_failure_falls_back_to_word_estimate() {
        // Without the unknown token in the vocabulary, unseen words fail to encode
        let dir = safetensors_dir(&word_level_json(&["a", "b"], "[UNK]"));
        let tokenizer = HfTokenizer::from_model_path(dir.path()).unwrap();

        let text = "one two three four five six seven eight nine ten";
        assert_eq!(tokenizer.count_tokens(text), WordTokenCounter.count_tokens(text));
        assert_eq!(tokenizer.count_tokens(text), 13);
    }

    #[test]
    fn test_invalid_model_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = HfTokenizer::from_model_path(dir.path()).err().unwrap();
        assert!(matches!(err, Error::InvalidModelFormat { .. }));
    }

    #[test]
    fn test_corrupt_tokenizer_reports_load_error_with_hint() {
        let dir = safetensors_dir("{}");

        match HfTokenizer::from_model_path(dir.path()) {
            Err(Error::TokenizerLoad { path, hint, .. }) => {
                assert_eq!(path, dir.path());
                assert!(hint.contains(&dir.path().display().to_string()));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("empty tokenizer.json must not load"),
        }
    }

    #[test]
    fn test_gguf_without_sidecar_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("granite.gguf");
        fs::write(&file, b"GGUF\x03\x00\x00\x00").unwrap();

        match HfTokenizer::from_model_path(&file) {
            Err(Error::TokenizerLoad { hint, .. }) => {
                assert!(hint.contains("granite.gguf"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("gguf without tokenizer.json must not load"),
        }
    }
}
