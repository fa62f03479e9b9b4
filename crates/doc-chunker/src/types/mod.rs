//! Core data types for documents and conversion outcomes

pub mod conversion;
pub mod document;

pub use conversion::{ConversionResult, ConversionStatus, ConversionSummary};
pub use document::{DocElement, ElementKind, FileType, StructuredDocument};
