//! OCR engines for PDFs without a text layer
//!
//! Both engines rasterize pages with `pdftoppm` and recognize each page
//! image with an external binary. Availability is probed once per session.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ChunkerConfig;
use crate::error::{Error, Result};

/// Rasterization resolution handed to pdftoppm
const RASTER_DPI: &str = "150";

/// An OCR engine able to recover page text from an image-only PDF
pub trait OcrEngine {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Whether the engine's binaries are installed and runnable
    fn probe(&self) -> bool;

    /// Recognize every page, one string per page in page order
    fn recognize_pdf(&self, data: &[u8]) -> Result<Vec<String>>;
}

/// Tesseract through its command-line interface
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractOcr {
    /// English recognition, using `models_dir` for traineddata when it has any
    pub fn new(models_dir: &Path) -> Self {
        let language = "eng".to_string();
        let tessdata_dir = models_dir
            .join(format!("{}.traineddata", language))
            .exists()
            .then(|| models_dir.to_path_buf());
        Self {
            language,
            tessdata_dir,
        }
    }

    fn recognize_image(&self, image: &Path) -> Result<String> {
        let mut command = Command::new("tesseract");
        command.arg(image).arg("stdout").args(["-l", self.language.as_str()]);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }

        let output = command
            .output()
            .map_err(|e| Error::ocr(format!("tesseract failed: {}", e)))?;
        if !output.status.success() {
            return Err(Error::ocr(format!(
                "tesseract error: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "Tesseract"
    }

    fn probe(&self) -> bool {
        has_pdftoppm()
            && Command::new("tesseract")
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    fn recognize_pdf(&self, data: &[u8]) -> Result<Vec<String>> {
        let scratch = ScratchDir::create("tesseract")?;
        let images = rasterize_pdf(data, scratch.path())?;

        let mut pages = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match self.recognize_image(image) {
                Ok(text) => pages.push(text.trim().to_string()),
                Err(e) => {
                    tracing::warn!("OCR failed on page {}: {}", i + 1, e);
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

/// EasyOCR reader parameters
#[derive(Debug, Clone)]
pub struct EasyOcrOptions {
    pub lang: Vec<String>,
    pub use_gpu: bool,
    /// Recognized lines below this confidence are dropped
    pub confidence_threshold: f64,
    pub model_storage_directory: PathBuf,
    pub recog_network: String,
    pub download_enabled: bool,
}

impl EasyOcrOptions {
    /// Fixed reader parameters, with GPU use following the accelerator setting
    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self {
            lang: vec!["en".to_string()],
            use_gpu: config.accelerator.effective_device().allows_gpu(),
            confidence_threshold: 0.5,
            model_storage_directory: config.models_dir(),
            recog_network: "standard".to_string(),
            download_enabled: true,
        }
    }
}

/// One line of `easyocr --output_format json`
#[derive(Debug, Deserialize)]
struct EasyOcrLine {
    text: String,
    confident: f64,
}

/// EasyOCR through its command-line interface
#[derive(Debug, Clone)]
pub struct EasyOcr {
    options: EasyOcrOptions,
}

impl EasyOcr {
    pub fn new(options: EasyOcrOptions) -> Self {
        Self { options }
    }

    /// Reader parameters
    pub fn options(&self) -> &EasyOcrOptions {
        &self.options
    }

    fn recognize_image(&self, image: &Path) -> Result<String> {
        let output = Command::new("easyocr")
            .arg("-l")
            .args(&self.options.lang)
            .arg("-f")
            .arg(image)
            .args(["--detail", "1", "--output_format", "json"])
            .args(["--recog_network", self.options.recog_network.as_str()])
            .arg("--model_storage_directory")
            .arg(&self.options.model_storage_directory)
            // argparse `type=bool` reads any non-empty string as true
            .args(["--gpu", bool_flag(self.options.use_gpu)])
            .args(["--download_enabled", bool_flag(self.options.download_enabled)])
            .output()
            .map_err(|e| Error::ocr(format!("easyocr failed: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ocr(format!(
                "easyocr error: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(parse_easyocr_output(
            &String::from_utf8_lossy(&output.stdout),
            self.options.confidence_threshold,
        ))
    }
}

impl OcrEngine for EasyOcr {
    fn name(&self) -> &'static str {
        "EasyOCR"
    }

    fn probe(&self) -> bool {
        has_pdftoppm()
            && Command::new("easyocr")
                .arg("--help")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    fn recognize_pdf(&self, data: &[u8]) -> Result<Vec<String>> {
        let scratch = ScratchDir::create("easyocr")?;
        let images = rasterize_pdf(data, scratch.path())?;

        let mut pages = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match self.recognize_image(image) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::warn!("OCR failed on page {}: {}", i + 1, e);
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

fn bool_flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        ""
    }
}

/// Keep recognized lines at or above the confidence threshold
fn parse_easyocr_output(stdout: &str, confidence_threshold: f64) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<EasyOcrLine>(line) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!("Skipping unparseable easyocr line: {}", e);
                None
            }
        })
        .filter(|l| l.confident >= confidence_threshold)
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Candidate engines in preference order: Tesseract, then EasyOCR
pub fn default_ocr_candidates(config: &ChunkerConfig) -> Vec<Box<dyn OcrEngine>> {
    let models_dir = config.models_dir();
    vec![
        Box::new(TesseractOcr::new(&models_dir)),
        Box::new(EasyOcr::new(EasyOcrOptions::from_config(config))),
    ]
}

/// Pick the first engine that probes successfully
///
/// Returns the index into `candidates`, or `None` (with a single warning)
/// when no engine is usable and the session must run without OCR.
pub fn resolve_ocr_engine(candidates: &[Box<dyn OcrEngine>]) -> Option<usize> {
    for (idx, engine) in candidates.iter().enumerate() {
        if engine.probe() {
            tracing::info!("Using {} for optical character recognition", engine.name());
            return Some(idx);
        }
        tracing::debug!("{} not found, trying next OCR engine", engine.name());
    }

    tracing::warn!(
        "Neither Tesseract nor EasyOCR is available - disabling optical character recognition in PDF documents"
    );
    None
}

fn has_pdftoppm() -> bool {
    Command::new("pdftoppm")
        .arg("-v")
        .output()
        .map(|_| true) // pdftoppm -v prints to stderr; only existence matters
        .unwrap_or(false)
}

/// Render PDF pages to PNG images inside `dir`, sorted by page
fn rasterize_pdf(data: &[u8], dir: &Path) -> Result<Vec<PathBuf>> {
    let pdf_path = dir.join("input.pdf");
    fs::write(&pdf_path, data)?;

    let output = Command::new("pdftoppm")
        .args(["-png", "-r", RASTER_DPI])
        .arg(&pdf_path)
        .arg(dir.join("page"))
        .output()
        .map_err(|e| Error::ocr(format!("pdftoppm failed: {}", e)))?;
    if !output.status.success() {
        return Err(Error::ocr(format!(
            "pdftoppm error: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let mut images: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(Error::ocr("pdftoppm produced no images"));
    }
    Ok(images)
}

/// Temporary working directory removed on drop
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create(label: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("doc-chunker-{}-{}", label, uuid::Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.0).ok();
    }
}
