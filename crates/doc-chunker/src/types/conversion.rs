//! Per-document conversion outcomes

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::document::StructuredDocument;

/// Conversion status of one document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failure,
}

/// Outcome of converting one input path
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Input path
    pub input: PathBuf,
    /// Conversion status
    pub status: ConversionStatus,
    /// Converted document, present on success
    pub document: Option<StructuredDocument>,
    /// Failure reason, present on failure
    pub error: Option<String>,
}

impl ConversionResult {
    /// Successful conversion
    pub fn success(document: StructuredDocument) -> Self {
        Self {
            input: document.source.clone(),
            status: ConversionStatus::Success,
            document: Some(document),
            error: None,
        }
    }

    /// Failed conversion
    pub fn failure(input: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            status: ConversionStatus::Failure,
            document: None,
            error: Some(error.into()),
        }
    }

    /// Whether the conversion succeeded
    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }

    /// Input path
    pub fn input(&self) -> &Path {
        &self.input
    }
}

/// Aggregate conversion counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Documents converted successfully
    pub success_count: usize,
    /// Documents that failed to convert
    pub failure_count: usize,
}

impl ConversionSummary {
    /// Count outcomes in a batch
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            success_count,
            failure_count: results.len() - success_count,
        }
    }

    /// Total documents processed
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}
