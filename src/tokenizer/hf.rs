//! HuggingFace `tokenizers` adapter

use std::path::Path;

use super::{TokenId, Tokenizer};
use crate::error::TokenizerError;

/// Tokenizer loaded from a `tokenizer.json` file
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let inner = tokenizers::Tokenizer::from_file(path.as_ref())
            .map_err(|e| TokenizerError::Load(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizerError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        self.inner
            .decode(tokens, false)
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}
