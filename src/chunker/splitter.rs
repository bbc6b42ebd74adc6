//! Level splitter: applies one rule level to a span of text
//!
//! Whitespace and delimiter levels return pieces whose concatenation is the
//! input (modulo `IncludeDelim::None`, which drops delimiters). The terminal
//! level cuts the token sequence into fixed windows and decodes each one.

use regex::Regex;

use super::rules::{IncludeDelim, RuleLevel, RuleSet};
use crate::error::TokenizerError;
use crate::tokenizer::{TokenId, Tokenizer};

/// A candidate piece with its token count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub token_count: usize,
}

/// Splits text according to the levels of a rule set
pub struct LevelSplitter<'a> {
    rules: &'a RuleSet,
    tokenizer: &'a dyn Tokenizer,
    chunk_size: usize,
    min_characters_per_chunk: usize,
}

impl<'a> LevelSplitter<'a> {
    pub fn new(
        rules: &'a RuleSet,
        tokenizer: &'a dyn Tokenizer,
        chunk_size: usize,
        min_characters_per_chunk: usize,
    ) -> Self {
        Self {
            rules,
            tokenizer,
            chunk_size,
            min_characters_per_chunk,
        }
    }

    /// Split `text` with the rule at `level`.
    ///
    /// Levels past the end of the rule set behave as the terminal token level.
    pub fn split(&self, text: &str, level: usize) -> Result<Vec<String>, TokenizerError> {
        match (self.rules.get(level), self.rules.matcher(level)) {
            (Some(RuleLevel::Whitespace), _) => Ok(split_whitespace(text)),
            (Some(RuleLevel::Delimiters { include_delim, .. }), Some(matcher)) => Ok(
                split_delimiters(text, matcher, *include_delim, self.min_characters_per_chunk),
            ),
            _ => Ok(self
                .token_windows(text)?
                .into_iter()
                .map(|segment| segment.text)
                .collect()),
        }
    }

    /// Terminal split: windows of exactly `chunk_size` tokens, the last may be shorter
    pub fn token_windows(&self, text: &str) -> Result<Vec<Segment>, TokenizerError> {
        token_windows(self.tokenizer, text, self.chunk_size)
    }
}

/// Split on the literal space character only.
///
/// Runs of spaces produce empty pieces so that joining with `' '` restores the
/// input exactly.
pub fn split_whitespace(text: &str) -> Vec<String> {
    text.split(' ').map(str::to_string).collect()
}

/// Split at every delimiter match, then merge pieces shorter than
/// `min_characters` into a running accumulator.
///
/// Cut points come from match offsets, so no marker text is ever inserted into
/// the input.
pub fn split_delimiters(
    text: &str,
    matcher: &Regex,
    include_delim: IncludeDelim,
    min_characters: usize,
) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for m in matcher.find_iter(text) {
        let (cut, resume) = match include_delim {
            IncludeDelim::Prev => (m.end(), m.end()),
            IncludeDelim::Next => (m.start(), m.start()),
            IncludeDelim::None => (m.start(), m.end()),
        };
        if cut > start {
            pieces.push(&text[start..cut]);
        }
        start = resume;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    merge_short_pieces(&pieces, min_characters)
}

fn merge_short_pieces(pieces: &[&str], min_characters: usize) -> Vec<String> {
    let mut merged = Vec::with_capacity(pieces.len());
    let mut current = String::new();
    let mut current_chars = 0;

    for piece in pieces {
        let piece_chars = piece.chars().count();

        if piece_chars < min_characters {
            current.push_str(piece);
            current_chars += piece_chars;
        } else if !current.is_empty() {
            current.push_str(piece);
            merged.push(std::mem::take(&mut current));
            current_chars = 0;
        } else {
            merged.push(piece.to_string());
        }

        if current_chars >= min_characters {
            merged.push(std::mem::take(&mut current));
            current_chars = 0;
        }
    }

    if !current.is_empty() {
        merged.push(current);
    }

    merged
}

/// Encode `text` and decode it back in windows of at most `window` tokens.
///
/// Byte-level BPE tokens can end in the middle of a multi-byte character, so a
/// window ends at the last position where it decodes on its own. The windows
/// still concatenate to `text`.
pub fn token_windows(
    tokenizer: &dyn Tokenizer,
    text: &str,
    window: usize,
) -> Result<Vec<Segment>, TokenizerError> {
    let tokens = tokenizer.encode(text)?;
    let window = window.max(1);

    let mut segments = Vec::with_capacity(tokens.len() / window + 1);
    let mut start = 0;
    while start < tokens.len() {
        let (end, text) = decode_window(tokenizer, &tokens, start, start + window)?;
        segments.push(Segment {
            text,
            token_count: end - start,
        });
        start = end;
    }
    Ok(segments)
}

/// Decode `tokens[start..end]` for the largest `end <= max_end` that decodes.
///
/// Only when no such `end` exists (one character spans more tokens than the
/// window) does the window grow past `max_end`.
pub fn decode_window(
    tokenizer: &dyn Tokenizer,
    tokens: &[TokenId],
    start: usize,
    max_end: usize,
) -> Result<(usize, String), TokenizerError> {
    let max_end = max_end.min(tokens.len()).max(start + 1);
    let mut last_err = None;

    for end in (start + 1..=max_end).rev().chain(max_end + 1..=tokens.len()) {
        match tokenizer.decode(&tokens[start..end]) {
            Ok(text) => return Ok((end, text)),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| TokenizerError::Decode("empty token window".to_string())))
}

/// Longest suffix of `tokens`, at most `max_take` long, that decodes on its own.
///
/// Returns the suffix length and its text; `(0, "")` when nothing decodes.
pub fn decode_suffix(
    tokenizer: &dyn Tokenizer,
    tokens: &[TokenId],
    max_take: usize,
) -> (usize, String) {
    let max_take = max_take.min(tokens.len());
    (1..=max_take)
        .rev()
        .find_map(|take| {
            tokenizer
                .decode(&tokens[tokens.len() - take..])
                .ok()
                .map(|text| (take, text))
        })
        .unwrap_or_default()
}
