//! Recursive rule-driven chunking
//!
//! Text is split with the coarsest rule level, the pieces are packed to the
//! token budget, and only groups that are still over budget descend to the
//! next level: paragraphs → sentences → clauses → words → raw tokens.

use tracing::debug;

use super::overlap::{refine_overlap, OverlapUnit};
use super::packer::{estimate_token_count, pack};
use super::rules::{RuleLevel, RuleSet};
use super::splitter::LevelSplitter;
use super::{validate_chunk_size, validate_minimum, Chunk, ChunkOverlap, Chunker};
use crate::error::{ChunkError, ConfigError, Result};
use crate::tokenizer::SharedTokenizer;

/// Default minimum size of a delimiter-level piece, in characters
pub const DEFAULT_MIN_CHARACTERS_PER_CHUNK: usize = 24;

/// Hierarchical token-budget chunker
#[derive(Clone)]
pub struct RecursiveChunker {
    tokenizer: SharedTokenizer,
    chunk_size: usize,
    chunk_overlap: usize,
    rules: RuleSet,
    min_characters_per_chunk: usize,
}

impl std::fmt::Debug for RecursiveChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("rules", &self.rules.levels())
            .field("min_characters_per_chunk", &self.min_characters_per_chunk)
            .finish()
    }
}

impl RecursiveChunker {
    /// Create a chunker with the default rule set and no overlap
    pub fn new(tokenizer: SharedTokenizer, chunk_size: usize) -> Result<Self, ConfigError> {
        validate_chunk_size(chunk_size)?;
        Ok(Self {
            tokenizer,
            chunk_size,
            chunk_overlap: 0,
            rules: RuleSet::default(),
            min_characters_per_chunk: DEFAULT_MIN_CHARACTERS_PER_CHUNK,
        })
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Overlap consecutive chunks by up to `overlap` tokens.
    ///
    /// Pieces are packed against `chunk_size - overlap` so that a chunk with its
    /// prepended overlap window still fits `chunk_size`.
    pub fn with_overlap(mut self, overlap: ChunkOverlap) -> Result<Self, ConfigError> {
        self.chunk_overlap = overlap.resolve(self.chunk_size)?;
        Ok(self)
    }

    pub fn with_min_characters_per_chunk(mut self, min_characters: usize) -> Result<Self, ConfigError> {
        validate_minimum("min_characters_per_chunk", min_characters)?;
        self.min_characters_per_chunk = min_characters;
        Ok(self)
    }

    pub fn tokenizer(&self) -> &SharedTokenizer {
        &self.tokenizer
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn splitter(&self, budget: usize) -> LevelSplitter<'_> {
        LevelSplitter::new(
            &self.rules,
            self.tokenizer.as_ref(),
            budget,
            self.min_characters_per_chunk,
        )
    }

    /// Chunk `text` at `level`, appending to `out`.
    ///
    /// `start` is the character offset of `text` in the original input. Each
    /// group advances the local cursor by its own length once it and all of its
    /// sub-chunks are finalized.
    fn recursive_chunk(
        &self,
        text: &str,
        level: usize,
        start: usize,
        budget: usize,
        out: &mut Vec<Chunk>,
    ) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let tokenizer = self.tokenizer.as_ref();
        let rule = self.rules.get(level).unwrap_or(&RuleLevel::Token);

        if rule.is_terminal() {
            let windows = self
                .splitter(budget)
                .token_windows(text)
                .map_err(ChunkError::tokenizer(level))?;
            let mut cursor = start;
            for window in windows {
                let chunk = Chunk::new(window.text, cursor, window.token_count, level);
                cursor = chunk.end_index;
                out.push(chunk);
            }
            return Ok(());
        }

        let splits = self
            .splitter(budget)
            .split(text, level)
            .map_err(ChunkError::tokenizer(level))?;
        let token_counts = splits
            .iter()
            .map(|split| estimate_token_count(tokenizer, split, budget))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ChunkError::tokenizer(level))?;

        let combine_whitespace = matches!(rule, RuleLevel::Whitespace);
        let groups = pack(&splits, &token_counts, budget, combine_whitespace);

        debug!(
            level,
            splits = splits.len(),
            groups = groups.len(),
            "Packed level"
        );

        let mut cursor = start;
        for group in groups {
            let exact = if group.token_count > budget {
                None
            } else {
                Some(
                    tokenizer
                        .count_tokens(&group.text)
                        .map_err(ChunkError::tokenizer(level))?,
                )
            };

            let group_chars = group.text.chars().count();
            match exact {
                Some(token_count) if token_count <= budget => {
                    out.push(Chunk::new(group.text, cursor, token_count, level));
                }
                _ => self.recursive_chunk(&group.text, level + 1, cursor, budget, out)?,
            }
            cursor += group_chars;
        }

        Ok(())
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let tokenizer = self.tokenizer.as_ref();
        let total = tokenizer.count_tokens(text).map_err(ChunkError::tokenizer(0))?;
        if total <= self.chunk_size {
            return Ok(vec![Chunk::new(text.to_string(), 0, total, 0)]);
        }

        let budget = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        self.recursive_chunk(text, 0, 0, budget, &mut chunks)?;

        if self.chunk_overlap > 0 {
            chunks = refine_overlap(chunks, self.chunk_overlap, OverlapUnit::Token, tokenizer)
                .map_err(ChunkError::tokenizer(0))?;
        }

        debug!("Chunked {} chars into {} chunks", text.chars().count(), chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chunker::rules::IncludeDelim;
    use crate::error::TokenizerError;
    use crate::tokenizer::{CharacterTokenizer, TokenId, Tokenizer};

    fn char_chunker(chunk_size: usize) -> RecursiveChunker {
        RecursiveChunker::new(Arc::new(CharacterTokenizer), chunk_size).unwrap()
    }

    fn assert_contiguous(text: &str, chunks: &[Chunk]) {
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
        assert_eq!(chunks.first().map(|c| c.start_index), Some(0));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_index, pair[1].start_index);
        }
        assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = RecursiveChunker::new(Arc::new(CharacterTokenizer), 0).unwrap_err();
        assert_eq!(err, ConfigError::ZeroChunkSize);
    }

    #[test]
    fn test_zero_min_characters_rejected() {
        let err = char_chunker(10).with_min_characters_per_chunk(0).unwrap_err();
        assert_eq!(err, ConfigError::ZeroMinimum("min_characters_per_chunk"));
    }

    #[test]
    fn test_empty_input() {
        assert!(char_chunker(10).chunk("").unwrap().is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = char_chunker(64).chunk("Short text.\n\nTwo paragraphs.").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].end_index, 28);
        assert_eq!(chunks[0].token_count, 28);
    }

    #[test]
    fn test_terminal_only_rules() {
        let rules = RuleSet::new(vec![RuleLevel::Token]).unwrap();
        let chunks = char_chunker(5).with_rules(rules).chunk("Hello world").unwrap();

        let expected = vec![
            Chunk { text: "Hello".into(), start_index: 0, end_index: 5, token_count: 5, level: 0 },
            Chunk { text: " worl".into(), start_index: 5, end_index: 10, token_count: 5, level: 0 },
            Chunk { text: "d".into(), start_index: 10, end_index: 11, token_count: 1, level: 0 },
        ];
        assert_eq!(chunks, expected);
    }

    #[test]
    fn test_paragraph_split() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = char_chunker(20)
            .with_min_characters_per_chunk(1)
            .unwrap()
            .chunk(text)
            .unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First paragraph.\n\n", "Second paragraph."]);
        assert!(chunks.iter().all(|c| c.level == 0));
        assert_contiguous(text, &chunks);
    }

    #[test]
    fn test_descends_only_where_needed() {
        let text = "Tiny.\n\nThis paragraph is much longer and has to be cut into words.";
        let chunks = char_chunker(20)
            .with_min_characters_per_chunk(1)
            .unwrap()
            .chunk(text)
            .unwrap();

        assert_eq!(chunks[0].text, "Tiny.\n\n");
        assert_eq!(chunks[0].level, 0);
        assert!(chunks[1..].iter().all(|c| c.level >= 3));
        assert!(chunks.iter().all(|c| c.token_count <= 20));
        assert_contiguous(text, &chunks);
    }

    #[test]
    fn test_long_word_reaches_token_level() {
        let text = format!("word {} word", "x".repeat(50));
        let chunks = char_chunker(8).chunk(&text).unwrap();

        assert!(chunks.iter().any(|c| c.level == 4));
        assert!(chunks.iter().all(|c| c.token_count <= 8));
        assert_contiguous(&text, &chunks);
    }

    #[test]
    fn test_missing_terminal_level_falls_back_to_windows() {
        let rules = RuleSet::new(vec![RuleLevel::Whitespace]).unwrap();
        let text = "abcdefghijkl mn";
        let chunks = char_chunker(5).with_rules(rules).chunk(text).unwrap();

        assert!(chunks.iter().all(|c| c.token_count <= 5));
        assert_eq!(chunks[0].level, 1);
        assert_contiguous(text, &chunks);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "Ünïcödé wörds everywhere.\n\nÄnd a sécond pärägraph here.";
        let chunks = char_chunker(30)
            .with_min_characters_per_chunk(1)
            .unwrap()
            .chunk(text)
            .unwrap();
        assert_contiguous(text, &chunks);
    }

    #[test]
    fn test_next_delimiter_inclusion() {
        let rules = RuleSet::new(vec![
            RuleLevel::delimiters(["\n# "], IncludeDelim::Next),
            RuleLevel::Token,
        ])
        .unwrap();
        let text = "# One\nbody one\n# Two\nbody two";
        let chunks = char_chunker(16)
            .with_rules(rules)
            .with_min_characters_per_chunk(1)
            .unwrap()
            .chunk(text)
            .unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["# One\nbody one", "\n# Two\nbody two"]);
    }

    #[test]
    fn test_overlap_stays_within_budget() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunker = char_chunker(20).with_overlap(ChunkOverlap::Tokens(4)).unwrap();
        let chunks = chunker.chunk(text).unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.token_count <= 20));
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_index + 4, pair[0].end_index);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Sentence one. Sentence two! Sentence three?\n\nAnother block, with pauses; and more.";
        let chunker = char_chunker(12);
        assert_eq!(chunker.chunk(text).unwrap(), chunker.chunk(text).unwrap());
    }

    struct FailingTokenizer;

    impl Tokenizer for FailingTokenizer {
        fn encode(&self, _text: &str) -> Result<Vec<TokenId>, TokenizerError> {
            Err(TokenizerError::Encode("backend offline".into()))
        }

        fn decode(&self, _tokens: &[TokenId]) -> Result<String, TokenizerError> {
            Err(TokenizerError::Decode("backend offline".into()))
        }
    }

    #[test]
    fn test_tokenizer_failure_propagates_with_level() {
        let chunker = RecursiveChunker::new(Arc::new(FailingTokenizer), 4).unwrap();
        let err = chunker.chunk("a b").unwrap_err();
        assert!(matches!(err, ChunkError::Tokenizer { level: 0, .. }));

        // Counting works, so the failure surfaces when the terminal level decodes
        let rules = RuleSet::new(vec![RuleLevel::Whitespace]).unwrap();
        let chunker = RecursiveChunker::new(Arc::new(DecodeFailingTokenizer), 4)
            .unwrap()
            .with_rules(rules);
        let err = chunker.chunk("abcdefgh ij").unwrap_err();
        assert!(matches!(err, ChunkError::Tokenizer { level: 1, .. }));
    }

    struct DecodeFailingTokenizer;

    impl Tokenizer for DecodeFailingTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
            CharacterTokenizer.encode(text)
        }

        fn decode(&self, _tokens: &[TokenId]) -> Result<String, TokenizerError> {
            Err(TokenizerError::Decode("backend offline".into()))
        }
    }

    /// One token per whitespace-separated word, however long
    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
            CharacterTokenizer.encode(text)
        }

        fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
            CharacterTokenizer.decode(tokens)
        }

        fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
            Ok(text.split_whitespace().count())
        }
    }

    #[test]
    fn test_fitting_text_is_one_chunk_with_long_words() {
        // 21 chars look like more than 2 tokens by length alone
        let text = "abcdefghij abcdefghij";
        let chunks = RecursiveChunker::new(Arc::new(WordTokenizer), 2).unwrap().chunk(text).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].token_count, 2);
    }
}
