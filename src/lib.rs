//! chunkwright - token-budget text chunking
//!
//! Splits text into ordered, position-addressable chunks that respect a token
//! budget. Strategies range from fixed token windows to rule-driven recursive
//! splitting and syntax-tree-aware packing for source code.

pub mod chunker;
pub mod config;
pub mod error;
pub mod tokenizer;

pub use chunker::{
    chunk_batch_concurrent, Chunk, ChunkOverlap, Chunker, ChunkingStrategy, CodeChunker,
    CodeLanguage, RecursiveChunker, RuleSet, SentenceChunker, SmartChunker, TokenChunker,
};
pub use config::Config;
pub use error::{ChunkError, ConfigError, TokenizerError};
pub use tokenizer::{SharedTokenizer, Tokenizer};
