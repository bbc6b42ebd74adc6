//! Token-budget packer
//!
//! Greedily merges adjacent pieces into groups that fit a token budget. The
//! boundary of each group is found by binary search over cumulative token
//! counts, so packing `n` pieces costs O(n log n) rather than O(n²).

use std::ops::Range;

use crate::error::TokenizerError;
use crate::tokenizer::Tokenizer;

/// Average characters per token for general-purpose subword tokenizers
pub const CHARS_PER_TOKEN: f64 = 6.5;

/// Cheap token count used to decide whether a piece needs more splitting.
///
/// When the character-based estimate already exceeds `chunk_size`, the exact
/// count is skipped and `chunk_size + 1` is returned. The value is only an
/// over/under-budget signal; emitted chunks are always re-counted.
pub fn estimate_token_count(
    tokenizer: &dyn Tokenizer,
    text: &str,
    chunk_size: usize,
) -> Result<usize, TokenizerError> {
    let estimate = ((text.chars().count() as f64 / CHARS_PER_TOKEN) as usize).max(1);
    if estimate > chunk_size {
        return Ok(chunk_size + 1);
    }
    tokenizer.count_tokens(text)
}

/// Prefix sums `C[0] = 0, C[i] = C[i-1] + counts[i-1] + join_cost`
pub fn cumulative_counts(counts: &[usize], join_cost: usize) -> Vec<usize> {
    let mut cumulative = Vec::with_capacity(counts.len() + 1);
    cumulative.push(0);
    let mut total = 0;
    for count in counts {
        total += count + join_cost;
        cumulative.push(total);
    }
    cumulative
}

/// End (exclusive) of the group starting at `pos`.
///
/// Picks the largest `idx` with `C[idx] - C[pos] <= chunk_size`, clamped to
/// `[pos, n]`, and always advances by at least one piece.
pub fn next_boundary(cumulative: &[usize], pos: usize, chunk_size: usize) -> usize {
    let n = cumulative.len() - 1;
    let target = cumulative[pos] + chunk_size;
    let idx = pos + cumulative[pos..].partition_point(|&c| c <= target);
    let idx = idx.saturating_sub(1).clamp(pos, n);
    if idx == pos {
        pos + 1
    } else {
        idx
    }
}

/// Index ranges of the packed groups, in order
pub fn group_ranges(counts: &[usize], chunk_size: usize, join_cost: usize) -> Vec<Range<usize>> {
    let cumulative = cumulative_counts(counts, join_cost);
    let n = counts.len();
    let mut ranges = Vec::new();
    let mut pos = 0;

    while pos < n {
        let end = next_boundary(&cumulative, pos, chunk_size);
        ranges.push(pos..end);
        pos = end;
    }

    ranges
}

/// A merged group and its (possibly estimated) token count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedGroup {
    pub text: String,
    pub token_count: usize,
}

/// Merge `splits` into groups bounded by `chunk_size`.
///
/// With `combine_whitespace` every piece costs one extra token for the space
/// that joins it back, pieces are joined with `' '`, and every group but the
/// first starts with the space that separated it from its predecessor.
pub fn pack(
    splits: &[String],
    token_counts: &[usize],
    chunk_size: usize,
    combine_whitespace: bool,
) -> Vec<PackedGroup> {
    debug_assert_eq!(splits.len(), token_counts.len());
    if splits.is_empty() || splits.len() != token_counts.len() {
        return Vec::new();
    }

    let join_cost = usize::from(combine_whitespace);
    let cumulative = cumulative_counts(token_counts, join_cost);

    group_ranges(token_counts, chunk_size, join_cost)
        .into_iter()
        .enumerate()
        .map(|(i, range)| {
            let token_count = cumulative[range.end] - cumulative[range.start];
            let pieces = &splits[range];
            let text = if combine_whitespace {
                let joined = pieces.join(" ");
                if i == 0 {
                    joined
                } else {
                    format!(" {}", joined)
                }
            } else {
                pieces.concat()
            };
            PackedGroup { text, token_count }
        })
        .collect()
}
