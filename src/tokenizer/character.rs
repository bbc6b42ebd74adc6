//! One token per Unicode scalar value

use super::{TokenId, Tokenizer};
use crate::error::TokenizerError;

/// Character-granular tokenizer.
///
/// Token ids are the scalar values themselves, so decode is an exact inverse of
/// encode for any window.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterTokenizer;

impl Tokenizer for CharacterTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(text.chars().map(|c| c as TokenId).collect())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        tokens
            .iter()
            .map(|&id| {
                char::from_u32(id)
                    .ok_or_else(|| TokenizerError::Decode(format!("invalid scalar value {}", id)))
            })
            .collect()
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.chars().count())
    }
}
