//! Native Markdown and PDF parsing into structured documents

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{DocElement, ElementKind, FileType, StructuredDocument};

/// Upper bound for pdf-extract on a single document
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest line still considered a numbered section heading in PDF text
const MAX_PDF_HEADING_CHARS: usize = 80;

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+\p{Lu}").expect("valid regex"));

/// Enclosing headings tracked while walking a document
#[derive(Debug, Default)]
struct HeadingStack {
    levels: Vec<(u8, String)>,
}

impl HeadingStack {
    /// Titles of the current enclosing headings
    fn titles(&self) -> Vec<String> {
        self.levels.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Enter a heading, closing any at the same or deeper level
    ///
    /// Returns the context the heading itself sits in.
    fn enter(&mut self, level: u8, title: &str) -> Vec<String> {
        while self.levels.last().is_some_and(|(l, _)| *l >= level) {
            self.levels.pop();
        }
        let context = self.titles();
        self.levels.push((level, title.to_string()));
        context
    }
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Parse markdown source into a structured document
    pub fn parse_markdown(source: &Path, text: &str) -> StructuredDocument {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut builder = MarkdownBuilder::default();
        for event in Parser::new_ext(text, options) {
            builder.handle(event);
        }

        StructuredDocument::new(source, FileType::Markdown, builder.finish())
    }

    /// Extract per-page text from a PDF
    ///
    /// Runs pdf-extract on a worker thread with a timeout and falls back to
    /// lopdf's per-page extraction when it errors, panics or hangs.
    pub fn extract_pdf_pages(name: &str, data: &[u8]) -> Result<Vec<String>> {
        let text = match Self::extract_pdf_with_timeout(name, data) {
            Some(text) => text,
            None => return Self::extract_pdf_pages_fallback(name, data),
        };

        let text = cleanup_pdf_text(&text);
        if text.contains('\x0C') {
            Ok(text.split('\x0C').map(|p| p.trim().to_string()).collect())
        } else {
            Ok(vec![text.trim().to_string()])
        }
    }

    /// Count pages with lopdf
    pub fn pdf_page_count(data: &[u8]) -> Option<u32> {
        lopdf::Document::load_mem(data)
            .ok()
            .map(|doc| doc.get_pages().len() as u32)
    }

    /// Build structured elements from page texts (1-indexed pages)
    pub fn elements_from_pages(pages: &[String]) -> Vec<DocElement> {
        let mut headings = HeadingStack::default();
        let mut elements = Vec::new();

        for (idx, page) in pages.iter().enumerate() {
            let page_number = idx as u32 + 1;
            for block in BLANK_LINES.split(page) {
                let text = block
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.is_empty() {
                    continue;
                }

                if let Some(level) = numbered_heading_level(&text) {
                    let context = headings.enter(level, &text);
                    elements.push(
                        DocElement::new(ElementKind::Heading { level }, text)
                            .with_headings(context)
                            .with_page(page_number),
                    );
                } else {
                    elements.push(
                        DocElement::new(ElementKind::Paragraph, text)
                            .with_headings(headings.titles())
                            .with_page(page_number),
                    );
                }
            }
        }

        demote_empty_headings(&mut elements);
        elements
    }

    fn extract_pdf_with_timeout(name: &str, data: &[u8]) -> Option<String> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec).map_err(|e| e.to_string());
            let _ = tx.send(result);
        });

        match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Some(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("[{}] pdf-extract failed: {}, trying fallback", name, e);
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The worker cannot be cancelled; it is left to finish on its own.
                tracing::error!("[{}] PDF extraction timed out after {:?}", name, PDF_EXTRACT_TIMEOUT);
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("[{}] PDF extraction thread crashed", name);
                None
            }
        }
    }

    fn extract_pdf_pages_fallback(name: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::conversion(name, format!("Failed to load PDF: {}", e)))?;

        let pages = doc
            .get_pages()
            .keys()
            .map(|page_number| match doc.extract_text(&[*page_number]) {
                Ok(text) => cleanup_pdf_text(&text).trim().to_string(),
                Err(e) => {
                    tracing::debug!("[{}] Could not get content for page {}: {}", name, page_number, e);
                    String::new()
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Level of a numbered section heading such as `2.1 Results`
fn numbered_heading_level(text: &str) -> Option<u8> {
    if text.chars().count() > MAX_PDF_HEADING_CHARS || text.ends_with(['.', ':', ',', ';']) {
        return None;
    }
    let captures = NUMBERED_HEADING.captures(text)?;
    let depth = captures[1].split('.').filter(|p| !p.is_empty()).count();
    Some(depth.clamp(1, 6) as u8)
}

/// Turn headings that head no content into paragraphs
///
/// A heading is only kept when the next element is body text or a deeper
/// heading; otherwise its text would never reach a chunk.
fn demote_empty_headings(elements: &mut [DocElement]) {
    for i in 0..elements.len() {
        let ElementKind::Heading { level } = elements[i].kind else {
            continue;
        };
        let has_content = match elements.get(i + 1).map(|e| &e.kind) {
            Some(ElementKind::Heading { level: next }) => *next > level,
            Some(_) => true,
            None => false,
        };
        if !has_content {
            elements[i].kind = ElementKind::Paragraph;
        }
    }
}

/// Normalize glyph artifacts common in extracted PDF text
fn cleanup_pdf_text(text: &str) -> String {
    let normalized = text
        .replace('\0', "")
        .replace('\r', "")
        .replace('\u{00A0}', " ") // Non-breaking space
        .replace('\u{00AD}', "") // Soft hyphen
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");

    let trimmed = normalized
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    EXCESS_NEWLINES.replace_all(&trimmed, "\n\n").into_owned()
}

/// Table being assembled from pulldown-cmark events
#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl TableBuilder {
    fn end_cell(&mut self) {
        let cell = std::mem::take(&mut self.cell);
        self.row.push(cell.trim().replace('|', "\\|"));
    }

    fn end_row(&mut self) {
        let row = std::mem::take(&mut self.row);
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    /// Render as a markdown table, header first
    fn render(&self) -> String {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return String::new();
        }

        let render_row = |row: &Vec<String>| {
            let mut cells = row.clone();
            cells.resize(width, String::new());
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        for (i, row) in self.rows.iter().enumerate() {
            lines.push(render_row(row));
            if i == 0 {
                lines.push(format!("|{}", " --- |".repeat(width)));
            }
        }
        lines.join("\n")
    }
}

/// Collects structural elements from a pulldown-cmark event stream
#[derive(Debug, Default)]
struct MarkdownBuilder {
    elements: Vec<DocElement>,
    headings: HeadingStack,
    buffer: String,
    heading_level: Option<u8>,
    item_depth: usize,
    quote_ends: Vec<TagEnd>,
    in_code: bool,
    table: Option<TableBuilder>,
}

impl MarkdownBuilder {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(end) => self.end(end),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_text(&format!("`{}`", code)),
            Event::SoftBreak => self.push_text(if self.in_code { "\n" } else { " " }),
            Event::HardBreak => self.push_text("\n"),
            Event::TaskListMarker(done) => self.push_text(if done { "[x] " } else { "[ ] " }),
            Event::Rule => self.flush(),
            Event::Html(html) | Event::InlineHtml(html) => {
                if html.trim_start().starts_with("<!--") {
                    tracing::debug!("Skipping HTML comment");
                } else {
                    self.push_text(&html);
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading_level = Some(level as u8);
            }
            Tag::Paragraph => {
                if self.item_depth == 0 && self.quote_ends.is_empty() {
                    self.flush();
                }
            }
            Tag::Item => {
                // A nested list ends the text of its parent item.
                self.flush();
                self.item_depth += 1;
            }
            tag @ Tag::BlockQuote(_) => {
                if self.quote_ends.is_empty() {
                    self.flush();
                }
                self.quote_ends.push(tag.to_end());
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code = true;
            }
            Tag::HtmlBlock => self.flush(),
            Tag::Table(_) => {
                self.flush();
                self.table = Some(TableBuilder::default());
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, end: TagEnd) {
        if self.quote_ends.last() == Some(&end) {
            self.quote_ends.pop();
            if self.quote_ends.is_empty() {
                self.emit(ElementKind::Quote);
            }
            return;
        }

        match end {
            TagEnd::Heading(_) => {
                let level = self.heading_level.take().unwrap_or(1);
                let title = std::mem::take(&mut self.buffer).trim().to_string();
                if !title.is_empty() {
                    let context = self.headings.enter(level, &title);
                    self.elements.push(
                        DocElement::new(ElementKind::Heading { level }, title).with_headings(context),
                    );
                }
            }
            TagEnd::Paragraph => {
                if self.item_depth == 0 && self.quote_ends.is_empty() {
                    self.emit(ElementKind::Paragraph);
                } else if !self.buffer.is_empty() {
                    self.buffer.push('\n');
                }
            }
            TagEnd::Item => {
                self.emit(ElementKind::ListItem);
                self.item_depth = self.item_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                let code = std::mem::take(&mut self.buffer);
                let code = code.trim_end_matches('\n');
                if !code.trim().is_empty() {
                    self.elements.push(
                        DocElement::new(ElementKind::Code, code).with_headings(self.headings.titles()),
                    );
                }
                self.in_code = false;
            }
            TagEnd::HtmlBlock => self.flush(),
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.end_cell();
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.end_row();
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let rendered = table.render();
                    if !rendered.is_empty() {
                        self.elements.push(
                            DocElement::new(ElementKind::Table, rendered)
                                .with_headings(self.headings.titles()),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.table.as_mut() {
            Some(table) => table.cell.push_str(text),
            None => self.buffer.push_str(text),
        }
    }

    /// Emit pending text as the element kind implied by the current nesting
    fn flush(&mut self) {
        let kind = if self.item_depth > 0 {
            ElementKind::ListItem
        } else if !self.quote_ends.is_empty() {
            ElementKind::Quote
        } else {
            ElementKind::Paragraph
        };
        self.emit(kind);
    }

    fn emit(&mut self, kind: ElementKind) {
        let text = std::mem::take(&mut self.buffer);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.elements
            .push(DocElement::new(kind, text).with_headings(self.headings.titles()));
    }

    fn finish(mut self) -> Vec<DocElement> {
        self.flush();
        self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<DocElement> {
        FileParser::parse_markdown(Path::new("test.md"), text).elements
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let elements = parse("# Title\n\nIntro text.\n\n## Section\n\nBody text.\n\n# Next\n\nMore.");

        assert_eq!(elements.len(), 6);
        assert_eq!(elements[0].kind, ElementKind::Heading { level: 1 });
        assert_eq!(elements[1].text, "Intro text.");
        assert_eq!(elements[1].headings, vec!["Title"]);
        assert_eq!(elements[3].text, "Body text.");
        assert_eq!(elements[3].headings, vec!["Title", "Section"]);
        assert_eq!(elements[4].headings, Vec::<String>::new());
        assert_eq!(elements[5].headings, vec!["Next"]);
    }

    #[test]
    fn test_list_items_are_separate_elements() {
        let elements = parse("- first item\n- second item\n  - nested item\n");
        let items: Vec<_> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::ListItem)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(items, vec!["first item", "second item", "nested item"]);
    }

    #[test]
    fn test_table_is_rendered_as_markdown() {
        let elements = parse("| Name | Value |\n|------|------:|\n| a | 1 |\n| b | 2 |\n");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Table);
        assert_eq!(
            elements[0].text,
            "| Name | Value |\n| --- | --- |\n| a | 1 |\n| b | 2 |"
        );
    }

    #[test]
    fn test_code_block_and_quote() {
        let elements = parse("```rust\nfn main() {}\n```\n\n> quoted\n> text\n");
        assert_eq!(elements[0].kind, ElementKind::Code);
        assert_eq!(elements[0].text, "fn main() {}");
        assert_eq!(elements[1].kind, ElementKind::Quote);
        assert_eq!(elements[1].text, "quoted text");
    }

    #[test]
    fn test_raw_html_is_kept() {
        let elements = parse("<div>\nRaw block\n</div>\n\n<!-- note -->\n\nPress <kbd>Ctrl</kbd> now.\n");

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind, ElementKind::Paragraph);
        assert_eq!(elements[0].text, "<div>\nRaw block\n</div>");
        assert_eq!(elements[1].text, "Press <kbd>Ctrl</kbd> now.");
    }

    #[test]
    fn test_inline_code_and_soft_breaks() {
        let elements = parse("Call `run()` to\nstart.");
        assert_eq!(elements[0].text, "Call `run()` to start.");
    }

    #[test]
    fn test_pdf_pages_to_elements() {
        let pages = vec![
            "1 Introduction\n\nThis paper studies\nchunking.".to_string(),
            "1.1 Scope\n\nOnly PDFs.\n\n\n".to_string(),
        ];
        let elements = FileParser::elements_from_pages(&pages);

        assert_eq!(elements.len(), 4);
        assert_eq!(elements[0].kind, ElementKind::Heading { level: 1 });
        assert_eq!(elements[1].text, "This paper studies chunking.");
        assert_eq!(elements[1].page, Some(1));
        assert_eq!(elements[2].kind, ElementKind::Heading { level: 2 });
        assert_eq!(elements[3].headings, vec!["1 Introduction", "1.1 Scope"]);
        assert_eq!(elements[3].page, Some(2));
    }

    #[test]
    fn test_heading_without_content_becomes_paragraph() {
        let pages = vec![
            "1 Results\n\n2 Outlook\n\nGrowth continues.".to_string(),
            "Revenue rose.\n\n2024 Revenue Summary".to_string(),
        ];
        let elements = FileParser::elements_from_pages(&pages);

        assert_eq!(elements.len(), 5);
        // Followed by a sibling heading, so nothing sits under it
        assert_eq!(elements[0].kind, ElementKind::Paragraph);
        assert_eq!(elements[0].text, "1 Results");
        assert_eq!(elements[1].kind, ElementKind::Heading { level: 1 });
        assert_eq!(elements[4].kind, ElementKind::Paragraph);
        assert_eq!(elements[4].text, "2024 Revenue Summary");
        assert!(elements[4].headings.is_empty());
        assert_eq!(elements[4].page, Some(2));
    }

    #[test]
    fn test_numbered_heading_heuristic() {
        assert_eq!(numbered_heading_level("2 Methods"), Some(1));
        assert_eq!(numbered_heading_level("3.2.1 Ablations"), Some(3));
        assert_eq!(numbered_heading_level("12 apples were eaten."), None);
        assert_eq!(numbered_heading_level("Results"), None);
    }

    #[test]
    fn test_cleanup_pdf_text() {
        let cleaned = cleanup_pdf_text("e\u{FB03}cient\u{00A0}run  \r\n\n\n\nnext\0");
        assert_eq!(cleaned, "efficient run\n\nnext");
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        let result = FileParser::extract_pdf_pages("broken.pdf", b"not a pdf at all");
        assert!(result.is_err());
    }
}
