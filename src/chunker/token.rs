//! Fixed-size token window chunking

use super::splitter::{decode_suffix, decode_window};
use super::{validate_chunk_size, Chunk, ChunkOverlap, Chunker};
use crate::error::{ChunkError, ConfigError, Result};
use crate::tokenizer::SharedTokenizer;

/// Chunker that cuts the token stream into windows of `chunk_size` tokens.
///
/// Consecutive windows share `chunk_overlap` tokens.
#[derive(Clone)]
pub struct TokenChunker {
    tokenizer: SharedTokenizer,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl std::fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl TokenChunker {
    pub fn new(tokenizer: SharedTokenizer, chunk_size: usize) -> Result<Self, ConfigError> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            tokenizer,
            chunk_size,
            chunk_overlap: 0,
        })
    }

    pub fn with_overlap(mut self, overlap: ChunkOverlap) -> Result<Self, ConfigError> {
        self.chunk_overlap = overlap.resolve(self.chunk_size)?;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for TokenChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let tokenizer = self.tokenizer.as_ref();
        let tokens = tokenizer.encode(text).map_err(ChunkError::tokenizer(0))?;

        if tokens.len() <= self.chunk_size {
            return Ok(vec![Chunk::new(text.to_string(), 0, tokens.len(), 0)]);
        }

        // Window ends and overlap starts move back to points where the tokens decode
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut cursor = 0;
        loop {
            let (end, text) = decode_window(tokenizer, &tokens, start, start + self.chunk_size)
                .map_err(ChunkError::tokenizer(0))?;
            let chunk = Chunk::new(text, cursor, end - start, 0);
            if end == tokens.len() {
                chunks.push(chunk);
                break;
            }

            let (take, overlap_text) =
                decode_suffix(tokenizer, &tokens[start + 1..end], self.chunk_overlap);
            cursor = chunk.end_index - overlap_text.chars().count();
            start = end - take;
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}
