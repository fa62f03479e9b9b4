//! Structured document types produced by conversion

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Supported source document types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// All supported types
    pub const ALL: [FileType; 2] = [FileType::Pdf, FileType::Markdown];

    /// Detect file type from a bare extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Dotted extension, as reported in errors
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Markdown => ".md",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Markdown => "Markdown",
        }
    }
}

/// Kind of a structural element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    /// Section heading (1-6)
    Heading { level: u8 },
    Paragraph,
    ListItem,
    /// Table rendered as a markdown table
    Table,
    /// Fenced or indented code block
    Code,
    /// Block quote
    Quote,
}

/// One structural element of a converted document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocElement {
    /// Element kind
    pub kind: ElementKind,
    /// Text content
    pub text: String,
    /// Enclosing headings, outermost first
    pub headings: Vec<String>,
    /// Source page (1-indexed), for paginated formats
    pub page: Option<u32>,
}

impl DocElement {
    /// Create an element with no heading context
    pub fn new(kind: ElementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            headings: Vec::new(),
            page: None,
        }
    }

    /// Set the heading context
    pub fn with_headings(mut self, headings: Vec<String>) -> Self {
        self.headings = headings;
        self
    }

    /// Set the source page
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Whether this element is a heading
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, ElementKind::Heading { .. })
    }

    /// Render the element as markdown
    pub fn to_markdown(&self) -> String {
        match self.kind {
            ElementKind::Heading { level } => {
                format!("{} {}", "#".repeat(level.clamp(1, 6) as usize), self.text)
            }
            ElementKind::Paragraph | ElementKind::Table => self.text.clone(),
            ElementKind::ListItem => format!("- {}", self.text),
            ElementKind::Code => format!("```\n{}\n```", self.text),
            ElementKind::Quote => self
                .text
                .lines()
                .map(|l| format!("> {}", l))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Normalized, structure-preserving representation of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Source file name
    pub name: String,
    /// Originating path
    pub source: PathBuf,
    /// Source file type
    pub file_type: FileType,
    /// Structural elements in reading order
    pub elements: Vec<DocElement>,
    /// Total pages (if applicable)
    pub total_pages: Option<u32>,
    /// Content hash of the markdown rendering
    pub content_hash: String,
    /// Whether text was recovered with OCR
    pub ocr_applied: bool,
}

impl StructuredDocument {
    /// Create a document from its elements
    pub fn new(source: impl Into<PathBuf>, file_type: FileType, elements: Vec<DocElement>) -> Self {
        let source = source.into();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        let mut doc = Self {
            name,
            source,
            file_type,
            elements,
            total_pages: None,
            content_hash: String::new(),
            ocr_applied: false,
        };
        doc.content_hash = hash_content(&doc.export_to_markdown());
        doc
    }

    /// Set the page count
    pub fn with_total_pages(mut self, total_pages: Option<u32>) -> Self {
        self.total_pages = total_pages;
        self
    }

    /// Mark the text as OCR-recovered
    pub fn with_ocr(mut self, ocr_applied: bool) -> Self {
        self.ocr_applied = ocr_applied;
        self
    }

    /// File stem used for exported artifacts
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Whether the document has no text content
    pub fn is_empty(&self) -> bool {
        self.elements.iter().all(|e| e.text.trim().is_empty())
    }

    /// Flattened markdown rendering
    pub fn export_to_markdown(&self) -> String {
        self.elements
            .iter()
            .map(DocElement::to_markdown)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Full JSON serialization
    pub fn export_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Hash content for deduplication
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(Path::new("a/report.pdf")), Some(FileType::Pdf));
        assert_eq!(FileType::from_path(Path::new("notes.MD")), Some(FileType::Markdown));
        assert_eq!(FileType::from_path(Path::new("notes.txt")), None);
        assert_eq!(FileType::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_markdown_rendering() {
        let doc = StructuredDocument::new(
            "guide.md",
            FileType::Markdown,
            vec![
                DocElement::new(ElementKind::Heading { level: 2 }, "Setup"),
                DocElement::new(ElementKind::Paragraph, "Install it."),
                DocElement::new(ElementKind::ListItem, "step one"),
                DocElement::new(ElementKind::Code, "cargo build"),
                DocElement::new(ElementKind::Quote, "note\nmore"),
            ],
        );

        assert_eq!(
            doc.export_to_markdown(),
            "## Setup\n\nInstall it.\n\n- step one\n\n```\ncargo build\n```\n\n> note\n> more"
        );
        assert_eq!(doc.stem(), "guide");
        assert_eq!(doc.content_hash.len(), 64);
    }

    #[test]
    fn test_json_export_round_trips_elements() {
        let doc = StructuredDocument::new(
            "paper.pdf",
            FileType::Pdf,
            vec![DocElement::new(ElementKind::Paragraph, "Body").with_page(2)],
        )
        .with_total_pages(Some(3));

        let json = doc.export_to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["file_type"], "pdf");
        assert_eq!(value["total_pages"], 3);
        assert_eq!(value["elements"][0]["kind"]["type"], "paragraph");
        assert_eq!(value["elements"][0]["page"], 2);
    }

    #[test]
    fn test_empty_document() {
        let doc = StructuredDocument::new(
            "blank.md",
            FileType::Markdown,
            vec![DocElement::new(ElementKind::Paragraph, "   ")],
        );
        assert!(doc.is_empty());
    }
}
