//! Chunk command - split files into JSONL chunk records

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use chunkwright::chunker::{Chunk, ChunkOverlap, ChunkingStrategy, SmartChunker};
use chunkwright::config::Config;

const DEFAULT_FILE_TYPES: &[&str] = &[
    ".txt", ".md", ".rst", ".py", ".js", ".ts", ".tsx", ".jsx", ".rs", ".go", ".java", ".c",
    ".cpp", ".cc", ".h", ".hpp", ".json", ".yaml", ".yml", ".toml", ".rb", ".cs",
];

#[derive(Args)]
pub struct ChunkArgs {
    /// Files and/or directories to chunk
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Chunking strategy (overrides config)
    #[arg(long, value_parser = ["token", "sentence", "recursive", "code", "auto"])]
    pub strategy: Option<String>,

    /// Chunk size in tokens
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunk overlap, in tokens or as a fraction of the chunk size
    #[arg(long)]
    pub chunk_overlap: Option<ChunkOverlap>,

    /// Tokenizer: character, a tiktoken encoding or model name
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Rule preset for recursive chunking: default, markdown, token
    #[arg(long)]
    pub rules: Option<String>,

    /// Write JSONL here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit only the chunk texts, one JSON string per line
    #[arg(long)]
    pub texts_only: bool,

    /// Comma-separated file extensions to include (e.g. ".md,.rs")
    #[arg(long)]
    pub file_types: Option<String>,

    /// Include hidden files and directories
    #[arg(long)]
    pub include_hidden: bool,
}

/// One output line
#[derive(Serialize)]
struct ChunkRecord<'a> {
    path: &'a str,
    chunk_index: usize,
    #[serde(flatten)]
    chunk: &'a Chunk,
}

pub async fn run(args: ChunkArgs, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load();
    let mut chunker_config = config.chunker.clone();

    if let Some(strategy) = &args.strategy {
        chunker_config.strategy = strategy
            .parse::<ChunkingStrategy>()
            .map_err(anyhow::Error::msg)?;
    }
    if let Some(chunk_size) = args.chunk_size {
        chunker_config.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.chunk_overlap {
        chunker_config.chunk_overlap = overlap;
    }
    if let Some(tokenizer) = args.tokenizer {
        chunker_config.tokenizer = tokenizer;
    }
    if let Some(rules) = args.rules {
        chunker_config.rules = rules;
        chunker_config.custom_rules = None;
    }

    let chunker = Arc::new(
        chunker_config
            .build_chunker()
            .context("Invalid chunker configuration")?,
    );

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message("Collecting files...");

    let file_types: Option<Vec<String>> = args
        .file_types
        .map(|ft| ft.split(',').map(|s| s.trim().to_string()).collect())
        .or_else(|| config.input.file_types.clone());
    let exclude_types = config.input.exclude_types.clone().unwrap_or_default();

    let files = collect_files(
        &args.paths,
        file_types.as_deref(),
        &exclude_types,
        args.include_hidden,
    );
    let documents = read_documents(&files, config.input.max_file_size_kb);

    info!(
        "Chunking {} files with {:?} strategy, chunk_size {}",
        documents.len(),
        chunker.strategy(),
        chunker_config.chunk_size
    );
    progress.set_message(format!("Chunking {} files...", documents.len()));

    let results = chunk_documents(chunker, documents).await?;
    let total: usize = results.iter().map(|(_, chunks)| chunks.len()).sum();

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    write_jsonl(&mut writer, &results, args.texts_only)?;
    writer.flush()?;

    progress.finish_with_message(format!("Wrote {} chunks from {} files", total, results.len()));
    Ok(())
}

/// Chunk each document on the blocking pool, keeping input order
async fn chunk_documents(
    chunker: Arc<SmartChunker>,
    documents: Vec<(PathBuf, String)>,
) -> anyhow::Result<Vec<(PathBuf, Vec<Chunk>)>> {
    let tasks = documents.into_iter().map(|(path, content)| {
        let chunker = Arc::clone(&chunker);
        tokio::task::spawn_blocking(move || {
            let chunks = chunker
                .chunk_path(&content, &path)
                .with_context(|| format!("Failed to chunk {}", path.display()))?;
            Ok::<_, anyhow::Error>((path, chunks))
        })
    });

    futures::future::try_join_all(tasks)
        .await?
        .into_iter()
        .collect()
}

fn write_jsonl(
    writer: &mut dyn Write,
    results: &[(PathBuf, Vec<Chunk>)],
    texts_only: bool,
) -> anyhow::Result<()> {
    for (path, chunks) in results {
        let path = path.to_string_lossy();
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if texts_only {
                serde_json::to_writer(&mut *writer, &chunk.text)?;
            } else {
                let record = ChunkRecord {
                    path: &path,
                    chunk_index,
                    chunk,
                };
                serde_json::to_writer(&mut *writer, &record)?;
            }
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn has_allowed_type(path: &Path, allowed: &[&str], excluded: &[String]) -> bool {
    let name = path.to_string_lossy();
    if excluded.iter().any(|e| name.ends_with(e.as_str())) {
        return false;
    }
    match path.extension() {
        Some(ext) => {
            let ext_str = format!(".{}", ext.to_string_lossy());
            allowed.iter().any(|e| *e == ext_str)
        }
        None => false,
    }
}

/// Expand paths into the list of files to chunk, walking directories with gitignore support
pub fn collect_files(
    paths: &[PathBuf],
    file_types: Option<&[String]>,
    exclude_types: &[String],
    include_hidden: bool,
) -> Vec<PathBuf> {
    use ignore::WalkBuilder;

    let allowed: Vec<&str> = file_types
        .map(|ft| ft.iter().map(|s| s.as_str()).collect())
        .unwrap_or_else(|| DEFAULT_FILE_TYPES.to_vec());

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            // Explicitly named files are always chunked
            files.push(path.clone());
        } else if path.is_dir() {
            let walker = WalkBuilder::new(path)
                .hidden(!include_hidden)
                .git_ignore(true)
                .git_global(true)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker.flatten() {
                let entry_path = entry.path();
                if entry_path.is_file() && has_allowed_type(entry_path, &allowed, exclude_types) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            warn!("Skipping {}: not a file or directory", path.display());
        }
    }
    files
}

fn read_documents(files: &[PathBuf], max_file_size_kb: usize) -> Vec<(PathBuf, String)> {
    let max_bytes = (max_file_size_kb as u64).saturating_mul(1024);

    files
        .iter()
        .filter_map(|path| {
            if let Ok(meta) = std::fs::metadata(path) {
                if meta.len() > max_bytes {
                    debug!("Skipping {} ({} bytes)", path.display(), meta.len());
                    return None;
                }
            }
            match std::fs::read_to_string(path) {
                Ok(content) => Some((path.clone(), content)),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_allowed_type() {
        let allowed = [".md", ".rs"];
        let excluded = vec![".min.rs".to_string()];
        assert!(has_allowed_type(Path::new("docs/readme.md"), &allowed, &excluded));
        assert!(!has_allowed_type(Path::new("src/app.min.rs"), &allowed, &excluded));
        assert!(!has_allowed_type(Path::new("Makefile"), &allowed, &excluded));
        assert!(!has_allowed_type(Path::new("data.csv"), &allowed, &excluded));
    }

    #[test]
    fn test_write_jsonl() {
        let chunk = Chunk::new("hello".to_string(), 0, 1, 0);
        let results = vec![(PathBuf::from("a.txt"), vec![chunk])];

        let mut buf = Vec::new();
        write_jsonl(&mut buf, &results, false).unwrap();
        let line = String::from_utf8(buf).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["path"], "a.txt");
        assert_eq!(value["chunk_index"], 0);
        assert_eq!(value["text"], "hello");
        assert_eq!(value["end_index"], 5);

        let mut buf = Vec::new();
        write_jsonl(&mut buf, &results, true).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"hello\"\n");
    }
}
