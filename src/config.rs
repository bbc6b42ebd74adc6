//! Configuration file support for chunkwright
//!
//! Config file location: ~/.config/chunkwright/config.toml
//!
//! Example config:
//! ```toml
//! [chunker]
//! strategy = "auto"  # token, sentence, recursive, code, auto
//! tokenizer = "cl100k_base"
//! chunk_size = 512
//! chunk_overlap = 0  # token count, or a fraction such as 0.1
//! rules = "default"  # default, markdown, token
//!
//! [input]
//! max_file_size_kb = 1024
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunker::recursive::DEFAULT_MIN_CHARACTERS_PER_CHUNK;
use crate::chunker::sentence::DEFAULT_MIN_CHARACTERS_PER_SENTENCE;
use crate::chunker::{
    ChunkOverlap, ChunkingStrategy, RecursiveChunker, RuleLevelSpec, RuleSet, SentenceChunker,
    SmartChunker, TokenChunker,
};
use crate::error::ConfigError;
use crate::tokenizer::{self, SharedTokenizer};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chunker: ChunkerConfig,

    #[serde(default)]
    pub input: InputConfig,
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Tokenizer name: character, a tiktoken encoding or model, or a tokenizer.json path
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Chunk size in tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap in tokens, or as a fraction of chunk_size
    #[serde(default)]
    pub chunk_overlap: ChunkOverlap,

    #[serde(default = "default_min_characters_per_chunk")]
    pub min_characters_per_chunk: usize,

    #[serde(default = "default_min_sentences_per_chunk")]
    pub min_sentences_per_chunk: usize,

    #[serde(default = "default_min_characters_per_sentence")]
    pub min_characters_per_sentence: usize,

    /// Rule preset for the recursive chunker
    #[serde(default = "default_rules")]
    pub rules: String,

    /// Explicit rule levels; overrides `rules` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<Vec<RuleLevelSpec>>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            tokenizer: default_tokenizer(),
            chunk_size: default_chunk_size(),
            chunk_overlap: ChunkOverlap::default(),
            min_characters_per_chunk: default_min_characters_per_chunk(),
            min_sentences_per_chunk: default_min_sentences_per_chunk(),
            min_characters_per_sentence: default_min_characters_per_sentence(),
            rules: default_rules(),
            custom_rules: None,
        }
    }
}

fn default_tokenizer() -> String {
    "cl100k_base".to_string()
}

fn default_chunk_size() -> usize {
    512
}

fn default_min_characters_per_chunk() -> usize {
    DEFAULT_MIN_CHARACTERS_PER_CHUNK
}

fn default_min_sentences_per_chunk() -> usize {
    1
}

fn default_min_characters_per_sentence() -> usize {
    DEFAULT_MIN_CHARACTERS_PER_SENTENCE
}

fn default_rules() -> String {
    "default".to_string()
}

impl ChunkerConfig {
    pub fn build_tokenizer(&self) -> Result<SharedTokenizer, ConfigError> {
        tokenizer::from_name(&self.tokenizer)
    }

    pub fn build_rules(&self) -> Result<RuleSet, ConfigError> {
        match &self.custom_rules {
            Some(specs) => RuleSet::from_specs(specs.clone()),
            None => RuleSet::from_preset(&self.rules),
        }
    }

    /// Build every strategy from this config, sharing one tokenizer
    pub fn build_chunker(&self) -> Result<SmartChunker, ConfigError> {
        let tokenizer = self.build_tokenizer()?;
        self.build_chunker_with(tokenizer)
    }

    pub fn build_chunker_with(&self, tokenizer: SharedTokenizer) -> Result<SmartChunker, ConfigError> {
        let token = TokenChunker::new(tokenizer.clone(), self.chunk_size)?
            .with_overlap(self.chunk_overlap)?;
        let sentence = SentenceChunker::new(tokenizer.clone(), self.chunk_size)?
            .with_overlap(self.chunk_overlap)?
            .with_min_sentences_per_chunk(self.min_sentences_per_chunk)?
            .with_min_characters_per_sentence(self.min_characters_per_sentence)?;
        let recursive = RecursiveChunker::new(tokenizer, self.chunk_size)?
            .with_rules(self.build_rules()?)
            .with_overlap(self.chunk_overlap)?
            .with_min_characters_per_chunk(self.min_characters_per_chunk)?;

        Ok(SmartChunker::new(self.strategy, token, sentence, recursive))
    }
}

/// Input file selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Maximum file size in KB
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: usize,

    /// File types to include
    pub file_types: Option<Vec<String>>,

    /// File types to exclude
    pub exclude_types: Option<Vec<String>>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_file_size_kb: default_max_file_size_kb(),
            file_types: None,
            exclude_types: None,
        }
    }
}

fn default_max_file_size_kb() -> usize {
    1024
}

const EXAMPLE_CONFIG: &str = r#"# chunkwright configuration
# Location: ~/.config/chunkwright/config.toml

[chunker]
# Strategy: token, sentence, recursive, code, auto (default: auto)
strategy = "auto"

# Tokenizer: character, cl100k_base, o200k_base, p50k_base, r50k_base,
# a model name such as gpt-4o, or a path to a tokenizer.json
tokenizer = "cl100k_base"

# Chunk size in tokens (default: 512)
chunk_size = 512

# Overlap in tokens, or a fraction of chunk_size such as 0.1 (default: 0)
chunk_overlap = 0

# Pieces shorter than this are merged with their neighbours (default: 24)
min_characters_per_chunk = 24

# Sentence strategy settings
min_sentences_per_chunk = 1
min_characters_per_sentence = 12

# Rule preset for the recursive strategy: default, markdown, token
rules = "default"

# Or spell the levels out; these replace the preset
# [[chunker.custom_rules]]
# delimiters = ["\n\n"]
#
# [[chunker.custom_rules]]
# delimiters = [". ", "! ", "? "]
# include_delim = "prev"
#
# [[chunker.custom_rules]]
# whitespace = true
#
# [[chunker.custom_rules]]

[input]
# Max file size in KB (default: 1024 = 1MB)
max_file_size_kb = 1024

# File types to include (default: all text files)
# file_types = [".md", ".txt", ".rs", ".py"]

# File types to exclude
# exclude_types = [".min.js", ".lock"]
"#;

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chunkwright")
            .join("config.toml")
    }

    /// Load config from file, returning defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Write the commented example config, replacing any existing file
    pub fn write_example() -> anyhow::Result<PathBuf> {
        let path = Self::config_path();
        create_example(&path, true)?;
        Ok(path)
    }

    /// Create example config file if it doesn't exist
    pub fn create_example_if_missing() -> anyhow::Result<bool> {
        create_example(&Self::config_path(), false)
    }
}

/// Write `EXAMPLE_CONFIG` to `path`; returns false when the file exists and `overwrite` is off
fn create_example(path: &Path, overwrite: bool) -> anyhow::Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)?;
    Ok(true)
}
