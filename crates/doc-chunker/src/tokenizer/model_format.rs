//! Detection of the model artifact layouts a tokenizer can be resolved from

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Files a safetensors model directory must contain
const REQUIRED_MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "tokenizer_config.json"];
/// Weight file extensions accepted in a model directory
const WEIGHT_EXTENSIONS: [&str; 2] = ["safetensors", "bin"];
/// Magic bytes at the start of every GGUF file
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// Recognized model artifact formats, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Directory of safetensors (or .bin) weights plus JSON configs
    Safetensors,
    /// Single-file quantized GGUF model
    Gguf,
}

impl ModelFormat {
    /// Detect the format of a model path, trying safetensors before GGUF
    pub fn detect(path: &Path) -> Option<Self> {
        if is_model_safetensors(path) {
            Some(Self::Safetensors)
        } else if is_model_gguf(path) {
            Some(Self::Gguf)
        } else {
            None
        }
    }
}

/// Check whether `path` is a directory holding a safetensors-style model
pub fn is_model_safetensors(path: &Path) -> bool {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Failed to read directory {}: {}", path.display(), e);
            return false;
        }
    };

    let files: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();

    let has_weights = files.iter().any(|f| {
        f.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| WEIGHT_EXTENSIONS.contains(&e))
    });
    if !has_weights {
        tracing::debug!("'{}' has no .safetensors or .bin files", path.display());
        return false;
    }

    let names: Vec<&str> = files
        .iter()
        .filter_map(|f| f.file_name().and_then(|n| n.to_str()))
        .collect();
    let missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|required| !names.contains(required))
        .collect();
    if !missing.is_empty() {
        tracing::debug!("'{}' is missing {:?}", path.display(), missing);
        return false;
    }

    for json_file in files
        .iter()
        .filter(|f| f.extension().is_some_and(|e| e == "json"))
    {
        let valid = File::open(json_file)
            .ok()
            .map(BufReader::new)
            .and_then(|reader| serde_json::from_reader::<_, serde_json::Value>(reader).ok())
            .is_some();
        if !valid {
            tracing::debug!("'{}' is not a valid JSON file", json_file.display());
            return false;
        }
    }

    true
}

/// Check whether `path` is a file starting with the GGUF magic bytes
pub fn is_model_gguf(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => &magic == GGUF_MAGIC,
        Err(e) => {
            tracing::debug!("Failed to read {} as GGUF: {}", path.display(), e);
            false
        }
    }
}
