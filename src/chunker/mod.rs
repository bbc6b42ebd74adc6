//! Chunking module - token-budget chunking strategies
//!
//! Provides fixed token windows, sentence packing, rule-driven recursive
//! chunking and syntax-tree-aware code chunking. Every strategy returns
//! [`Chunk`]s with character offsets into the original input.

pub mod ast;
pub mod overlap;
pub mod packer;
pub mod recursive;
pub mod rules;
pub mod sentence;
pub mod splitter;
pub mod token;

pub use ast::{CodeChunker, CodeLanguage, SyntaxNode};
pub use overlap::{refine_overlap, OverlapUnit};
pub use recursive::RecursiveChunker;
pub use rules::{IncludeDelim, RuleLevel, RuleLevelSpec, RuleSet};
pub use sentence::{Sentence, SentenceChunker};
pub use token::TokenChunker;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ConfigError, Result};
use crate::tokenizer::SharedTokenizer;

/// A finalized, position-addressable piece of the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Character offset of the first char (inclusive)
    pub start_index: usize,
    /// Character offset past the last char (exclusive)
    pub end_index: usize,
    pub token_count: usize,
    /// Recursion depth at which the chunk was finalized
    pub level: usize,
}

impl Chunk {
    pub fn new(text: String, start_index: usize, token_count: usize, level: usize) -> Self {
        let end_index = start_index + text.chars().count();
        Self {
            text,
            start_index,
            end_index,
            token_count,
            level,
        }
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Overlap between consecutive chunks, as a token count or a fraction of `chunk_size`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkOverlap {
    Tokens(usize),
    Fraction(f64),
}

impl Default for ChunkOverlap {
    fn default() -> Self {
        Self::Tokens(0)
    }
}

impl ChunkOverlap {
    /// Resolve to a token count, rejecting anything that is not below `chunk_size`
    pub fn resolve(self, chunk_size: usize) -> std::result::Result<usize, ConfigError> {
        let tokens = match self {
            Self::Tokens(tokens) => tokens,
            Self::Fraction(fraction) => {
                if !(0.0..1.0).contains(&fraction) {
                    return Err(ConfigError::InvalidOverlapFraction(fraction));
                }
                (fraction * chunk_size as f64) as usize
            }
        };

        if tokens >= chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: tokens,
                chunk_size,
            });
        }
        Ok(tokens)
    }
}

impl std::str::FromStr for ChunkOverlap {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(tokens) = s.parse::<usize>() {
            return Ok(Self::Tokens(tokens));
        }
        s.parse::<f64>()
            .map(Self::Fraction)
            .map_err(|_| format!("Invalid chunk overlap: {}", s))
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> std::result::Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::ZeroChunkSize);
    }
    Ok(())
}

pub(crate) fn validate_minimum(
    name: &'static str,
    value: usize,
) -> std::result::Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroMinimum(name));
    }
    Ok(())
}

/// Trait for chunkers
pub trait Chunker: Send + Sync {
    /// Chunk text into ordered pieces
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>>;

    /// Chunk text, keeping only the chunk texts
    fn chunk_texts(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.chunk(text)?.into_iter().map(|c| c.text).collect())
    }

    /// Chunk several texts; result `i` belongs to input `i`
    fn chunk_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Chunk>>> {
        texts.iter().map(|text| self.chunk(text)).collect()
    }
}

/// Chunk texts concurrently on the blocking pool, preserving input order
pub async fn chunk_batch_concurrent(
    chunker: Arc<dyn Chunker>,
    texts: Vec<String>,
) -> Result<Vec<Vec<Chunk>>> {
    let tasks = texts.into_iter().map(|text| {
        let chunker = Arc::clone(&chunker);
        tokio::task::spawn_blocking(move || chunker.chunk(&text))
    });

    futures::future::try_join_all(tasks)
        .await
        .map_err(|e| ChunkError::Join(e.to_string()))?
        .into_iter()
        .collect()
}

/// Chunking strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed token windows
    Token,
    /// Whole sentences packed to the budget
    Sentence,
    /// Rule-driven hierarchical splitting
    Recursive,
    /// Syntax-tree-aware chunking for code files
    Code,
    /// Auto-detect based on file type
    #[default]
    Auto,
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "sentence" => Ok(Self::Sentence),
            "recursive" => Ok(Self::Recursive),
            "code" | "ast" => Ok(Self::Code),
            "auto" => Ok(Self::Auto),
            _ => Err(format!("Unknown chunking strategy: {}", s)),
        }
    }
}

/// Unified chunker that selects a strategy per input path
pub struct SmartChunker {
    strategy: ChunkingStrategy,
    token: TokenChunker,
    sentence: SentenceChunker,
    recursive: RecursiveChunker,
    tokenizer: SharedTokenizer,
    chunk_size: usize,
}

impl SmartChunker {
    pub fn new(
        strategy: ChunkingStrategy,
        token: TokenChunker,
        sentence: SentenceChunker,
        recursive: RecursiveChunker,
    ) -> Self {
        let tokenizer = recursive.tokenizer().clone();
        let chunk_size = recursive.chunk_size();
        Self {
            strategy,
            token,
            sentence,
            recursive,
            tokenizer,
            chunk_size,
        }
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    /// Code chunker for the file's language, if it has a supported grammar
    fn code_chunker(&self, path: &Path) -> Option<CodeChunker> {
        let language = CodeLanguage::from_path(path)?;
        CodeChunker::new(self.tokenizer.clone(), self.chunk_size, language).ok()
    }

    /// Chunk `text` with the strategy chosen for `path`
    pub fn chunk_path(&self, text: &str, path: &Path) -> Result<Vec<Chunk>> {
        match self.strategy {
            ChunkingStrategy::Token => self.token.chunk(text),
            ChunkingStrategy::Sentence => self.sentence.chunk(text),
            ChunkingStrategy::Recursive => self.recursive.chunk(text),
            ChunkingStrategy::Code | ChunkingStrategy::Auto => match self.code_chunker(path) {
                Some(code) => code.chunk(text),
                None => {
                    if self.strategy == ChunkingStrategy::Code {
                        tracing::debug!(
                            "No grammar for {}, falling back to recursive chunking",
                            path.display()
                        );
                    }
                    self.recursive.chunk(text)
                }
            },
        }
    }
}

impl Chunker for SmartChunker {
    /// Without a path there is nothing to detect; code falls back to recursive.
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        match self.strategy {
            ChunkingStrategy::Token => self.token.chunk(text),
            ChunkingStrategy::Sentence => self.sentence.chunk(text),
            _ => self.recursive.chunk(text),
        }
    }
}
