//! Overlap windows between finished chunks
//!
//! Runs after packing: each chunk except the first gets the tail of its
//! predecessor prepended, so retrieval sees some context across boundaries.

use serde::{Deserialize, Serialize};

use super::splitter::decode_suffix;
use super::Chunk;
use crate::error::TokenizerError;
use crate::tokenizer::Tokenizer;

/// Unit in which the overlap budget is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapUnit {
    #[default]
    Token,
    Character,
}

/// Prepend a suffix window of up to `budget` units from each chunk's predecessor.
///
/// Windows are taken from the predecessor as it was before refinement and never
/// exceed its span. `start_index` moves back by the window's character length,
/// but never past the predecessor's own start.
pub fn refine_overlap(
    chunks: Vec<Chunk>,
    budget: usize,
    unit: OverlapUnit,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Chunk>, TokenizerError> {
    if budget == 0 || chunks.len() < 2 {
        return Ok(chunks);
    }

    let mut refined = Vec::with_capacity(chunks.len());
    refined.push(chunks[0].clone());

    for pair in chunks.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        let window = suffix_window(prev, budget, unit, tokenizer)?;

        // Clamp to the predecessor's span
        let max_chars = current.start_index.saturating_sub(prev.start_index);
        let window_chars = window.chars().count();
        let window = if window_chars > max_chars {
            window.chars().skip(window_chars - max_chars).collect()
        } else {
            window
        };
        let shift = window_chars.min(max_chars);

        // Tokens can merge across the seam, so the joined text is counted again
        let text = format!("{}{}", window, current.text);
        let token_count = tokenizer.count_tokens(&text)?;
        refined.push(Chunk {
            text,
            start_index: current.start_index - shift,
            end_index: current.end_index,
            token_count,
            level: current.level,
        });
    }

    Ok(refined)
}

/// Tail of `chunk` within `budget` units. A token tail shrinks until it decodes.
fn suffix_window(
    chunk: &Chunk,
    budget: usize,
    unit: OverlapUnit,
    tokenizer: &dyn Tokenizer,
) -> Result<String, TokenizerError> {
    match unit {
        OverlapUnit::Token => {
            let tokens = tokenizer.encode(&chunk.text)?;
            Ok(decode_suffix(tokenizer, &tokens, budget).1)
        }
        OverlapUnit::Character => {
            let chars = chunk.text.chars().count();
            Ok(chunk.text.chars().skip(chars.saturating_sub(budget)).collect())
        }
    }
}
