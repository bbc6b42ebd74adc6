//! Error types for configuration, tokenization and chunking

use thiserror::Error;

/// Invalid chunker configuration, reported at construction time
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than 0")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be less than chunk_size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },

    #[error("chunk_overlap fraction must be in [0, 1), got {0}")]
    InvalidOverlapFraction(f64),

    #[error("{0} must be greater than 0")]
    ZeroMinimum(&'static str),

    #[error("rule set must contain at least one level")]
    EmptyRuleSet,

    #[error("rule level {level}: {reason}")]
    InvalidRuleLevel { level: usize, reason: String },

    #[error("unknown rule preset: {0}")]
    UnknownPreset(String),

    #[error("unknown tokenizer: {0}")]
    UnknownTokenizer(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Failure reported by a tokenizer backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenizerError {
    #[error("failed to load tokenizer: {0}")]
    Load(String),

    #[error("failed to encode text: {0}")]
    Encode(String),

    #[error("failed to decode tokens: {0}")]
    Decode(String),
}

/// Error raised while chunking a single input
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tokenizer failed at level {level}: {source}")]
    Tokenizer {
        level: usize,
        #[source]
        source: TokenizerError,
    },

    #[error("failed to parse {language} source")]
    Parse { language: String },

    #[error("blocking task failed: {0}")]
    Join(String),
}

impl ChunkError {
    /// Attach the recursion depth to a tokenizer failure
    pub fn tokenizer(level: usize) -> impl FnOnce(TokenizerError) -> Self {
        move |source| Self::Tokenizer { level, source }
    }
}

pub type Result<T, E = ChunkError> = std::result::Result<T, E>;
