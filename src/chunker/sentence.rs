//! Sentence-boundary chunking
//!
//! Sentences are never cut unless a single one is larger than the budget. The
//! packer picks group boundaries by bisection over cumulative sentence token
//! counts, then widens them to honor `min_sentences_per_chunk`.

use regex::Regex;
use tracing::warn;

use super::packer::{cumulative_counts, next_boundary};
use super::rules::IncludeDelim;
use super::splitter::{split_delimiters, token_windows};
use super::{validate_chunk_size, validate_minimum, Chunk, ChunkOverlap, Chunker};
use crate::error::{ChunkError, ConfigError, Result};
use crate::tokenizer::SharedTokenizer;

pub const DEFAULT_SENTENCE_DELIMITERS: [&str; 4] = [". ", "! ", "? ", "\n"];
pub const DEFAULT_MIN_CHARACTERS_PER_SENTENCE: usize = 12;

/// A sentence with its position in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub token_count: usize,
}

/// Chunker that packs whole sentences
#[derive(Clone)]
pub struct SentenceChunker {
    tokenizer: SharedTokenizer,
    chunk_size: usize,
    chunk_overlap: usize,
    min_sentences_per_chunk: usize,
    min_characters_per_sentence: usize,
    include_delim: IncludeDelim,
    matcher: Regex,
}

impl std::fmt::Debug for SentenceChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("min_sentences_per_chunk", &self.min_sentences_per_chunk)
            .field("min_characters_per_sentence", &self.min_characters_per_sentence)
            .field("include_delim", &self.include_delim)
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl SentenceChunker {
    pub fn new(tokenizer: SharedTokenizer, chunk_size: usize) -> Result<Self, ConfigError> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            tokenizer,
            chunk_size,
            chunk_overlap: 0,
            min_sentences_per_chunk: 1,
            min_characters_per_sentence: DEFAULT_MIN_CHARACTERS_PER_SENTENCE,
            include_delim: IncludeDelim::Prev,
            matcher: sentence_matcher(&DEFAULT_SENTENCE_DELIMITERS)?,
        })
    }

    pub fn with_overlap(mut self, overlap: ChunkOverlap) -> Result<Self, ConfigError> {
        self.chunk_overlap = overlap.resolve(self.chunk_size)?;
        Ok(self)
    }

    pub fn with_min_sentences_per_chunk(mut self, min_sentences: usize) -> Result<Self, ConfigError> {
        validate_minimum("min_sentences_per_chunk", min_sentences)?;
        self.min_sentences_per_chunk = min_sentences;
        Ok(self)
    }

    pub fn with_min_characters_per_sentence(
        mut self,
        min_characters: usize,
    ) -> Result<Self, ConfigError> {
        validate_minimum("min_characters_per_sentence", min_characters)?;
        self.min_characters_per_sentence = min_characters;
        Ok(self)
    }

    pub fn with_delimiters<S: AsRef<str>>(
        mut self,
        delimiters: &[S],
        include_delim: IncludeDelim,
    ) -> Result<Self, ConfigError> {
        self.matcher = sentence_matcher(delimiters)?;
        self.include_delim = include_delim;
        Ok(self)
    }

    /// Split text into sentences with exact token counts
    pub fn split_sentences(&self, text: &str) -> Result<Vec<Sentence>> {
        let pieces = split_delimiters(
            text,
            &self.matcher,
            self.include_delim,
            self.min_characters_per_sentence,
        );
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let counts = self
            .tokenizer
            .count_tokens_batch(&refs)
            .map_err(ChunkError::tokenizer(0))?;

        let mut cursor = 0;
        Ok(pieces
            .into_iter()
            .zip(counts)
            .map(|(text, token_count)| {
                let start_index = cursor;
                cursor += text.chars().count();
                Sentence {
                    text,
                    start_index,
                    end_index: cursor,
                    token_count,
                }
            })
            .collect())
    }

    fn emit(&self, sentences: &[Sentence], out: &mut Vec<Chunk>) -> Result<()> {
        let text: String = sentences.iter().map(|s| s.text.as_str()).collect();
        let start = sentences[0].start_index;
        let token_count = self
            .tokenizer
            .count_tokens(&text)
            .map_err(ChunkError::tokenizer(0))?;

        if token_count <= self.chunk_size || sentences.len() > 1 {
            out.push(Chunk::new(text, start, token_count, 0));
            return Ok(());
        }

        // A lone sentence over budget falls through to raw token windows
        let windows = token_windows(self.tokenizer.as_ref(), &text, self.chunk_size)
            .map_err(ChunkError::tokenizer(1))?;
        let mut cursor = start;
        for window in windows {
            let chunk = Chunk::new(window.text, cursor, window.token_count, 1);
            cursor = chunk.end_index;
            out.push(chunk);
        }
        Ok(())
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let sentences = self.split_sentences(text)?;
        let counts: Vec<usize> = sentences.iter().map(|s| s.token_count).collect();
        let cumulative = cumulative_counts(&counts, 0);
        let n = sentences.len();

        let mut chunks = Vec::new();
        let mut pos = 0;

        while pos < n {
            let mut split_idx = next_boundary(&cumulative, pos, self.chunk_size);

            if split_idx - pos < self.min_sentences_per_chunk {
                if pos + self.min_sentences_per_chunk <= n {
                    split_idx = pos + self.min_sentences_per_chunk;
                } else {
                    warn!(
                        "Minimum of {} sentences per chunk could not be met; last chunk has {} sentences",
                        self.min_sentences_per_chunk,
                        n - pos
                    );
                    split_idx = n;
                }
            }

            self.emit(&sentences[pos..split_idx], &mut chunks)?;

            if self.chunk_overlap > 0 && split_idx < n {
                // Walk back over trailing sentences that fit in the overlap budget
                let mut overlap_tokens = 0;
                let mut overlap_idx = split_idx - 1;
                while overlap_idx > pos && overlap_tokens < self.chunk_overlap {
                    let next_tokens = overlap_tokens + sentences[overlap_idx].token_count;
                    if next_tokens > self.chunk_overlap {
                        break;
                    }
                    overlap_tokens = next_tokens;
                    overlap_idx -= 1;
                }
                pos = overlap_idx + 1;
            } else {
                pos = split_idx;
            }
        }

        Ok(chunks)
    }
}

fn sentence_matcher<S: AsRef<str>>(delimiters: &[S]) -> Result<Regex, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRuleLevel { level: 0, reason };

    if delimiters.is_empty() || delimiters.iter().any(|d| d.as_ref().is_empty()) {
        return Err(invalid("sentence delimiters must be non-empty".to_string()));
    }
    if delimiters.iter().any(|d| d.as_ref().chars().all(|c| c == ' ')) {
        return Err(invalid("space-only sentence delimiters are not allowed".to_string()));
    }

    let pattern = delimiters
        .iter()
        .map(|d| regex::escape(d.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).map_err(|e| invalid(e.to_string()))
}
