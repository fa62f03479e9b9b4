//! doc-chunker: convert and chunk PDF or Markdown documents
//!
//! Usage:
//!   doc-chunker chunk --tokenizer models/granite docs/ --output chunks.json
//!   doc-chunker probe-ocr
//!   doc-chunker count-tokens --tokenizer models/granite notes.md

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use doc_chunker::ingestion::ocr::{default_ocr_candidates, resolve_ocr_engine};
use doc_chunker::pipeline::is_supported_document;
use doc_chunker::{ChunkerConfig, DocumentChunker, HfTokenizer, TokenCounter};

/// Convert documents and split them into chunks for training data generation.
#[derive(Parser)]
#[command(name = "doc-chunker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert and chunk documents of a single type.
    Chunk(ChunkArgs),

    /// Report which OCR engine would be used.
    ProbeOcr {
        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the token count of a file's text.
    CountTokens {
        /// Model directory (safetensors) or GGUF file.
        #[arg(long)]
        tokenizer: PathBuf,

        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct ChunkArgs {
    /// Document files or directories to scan for .pdf/.md files.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Model directory (safetensors) or GGUF file providing the tokenizer.
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target words per final chunk.
    #[arg(long)]
    chunk_word_count: Option<usize>,

    /// Chunks at or below this many tokens are fused into the previous one.
    #[arg(long)]
    short_length_threshold: Option<usize>,

    /// Token ceiling of the hybrid chunker.
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Skip OCR for PDFs without a text layer.
    #[arg(long)]
    no_ocr: bool,

    /// Export converted documents as JSON and Markdown into this directory.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Write chunks as a JSON array to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_chunker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Chunk(args) => chunk(args),
        Command::ProbeOcr { config } => probe_ocr(config.as_deref()),
        Command::CountTokens { tokenizer, file } => count_tokens(&tokenizer, &file),
    }
}

fn load_config(path: Option<&Path>) -> Result<ChunkerConfig> {
    match path {
        Some(path) => ChunkerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ChunkerConfig::default()),
    }
}

fn chunk(args: ChunkArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(tokenizer) = args.tokenizer {
        config.tokenizer_model_name_or_path = tokenizer;
    }
    if let Some(words) = args.chunk_word_count {
        config.chunk_word_count = words;
    }
    if let Some(threshold) = args.short_length_threshold {
        config.short_length_threshold = threshold;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }
    if args.no_ocr {
        config.ocr.enabled = false;
    }
    if let Some(dir) = args.export_dir {
        config.export.enabled = true;
        config.export.dir = dir;
    }
    if config.tokenizer_model_name_or_path.as_os_str().is_empty() {
        bail!("no tokenizer configured; pass --tokenizer or set tokenizer_model_name_or_path");
    }

    let documents = collect_documents(&args.paths)?;
    let mut chunker = DocumentChunker::new(documents, config)?;
    let report = chunker.run()?;

    let json = serde_json::to_string_pretty(&report.chunks)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    eprintln!(
        "{} chunks from {} documents ({} failed to convert, {} failed to chunk)",
        report.chunks.len(),
        report.conversion.total(),
        report.conversion.failure_count,
        report.chunking_failures.len()
    );
    if let Some(dir) = report.export_dir {
        eprintln!("Conversion artifacts written to {}", dir.display());
    }
    Ok(())
}

/// Expand directories into their supported documents, sorted by path
fn collect_documents(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for path in paths {
        if !path.is_dir() {
            documents.push(path.clone());
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
            if entry.file_type().is_file() && is_supported_document(entry.path()) {
                documents.push(entry.into_path());
            }
        }
    }
    Ok(documents)
}

fn probe_ocr(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let candidates = default_ocr_candidates(&config);
    match resolve_ocr_engine(&candidates).and_then(|idx| candidates.get(idx)) {
        Some(engine) => println!("{}", engine.name()),
        None => println!("none"),
    }
    Ok(())
}

fn count_tokens(tokenizer: &Path, file: &Path) -> Result<()> {
    let tokenizer = HfTokenizer::from_model_path(tokenizer)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    println!("{}", tokenizer.count_tokens(&text));
    Ok(())
}
