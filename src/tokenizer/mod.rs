//! Tokenizer capability consumed by the chunkers
//!
//! The chunking engine never decides how tokens are produced. Anything that can
//! encode, decode and count implements [`Tokenizer`]; batch variants default to
//! looping over the single-item methods.

mod character;
#[cfg(feature = "hf-tokenizers")]
mod hf;
mod tiktoken;

pub use character::CharacterTokenizer;
#[cfg(feature = "hf-tokenizers")]
pub use hf::HfTokenizer;
pub use tiktoken::TiktokenTokenizer;

use std::sync::Arc;

use crate::error::{ConfigError, TokenizerError};

/// Token id type shared by all backends
pub type TokenId = u32;

/// Trait for tokenizer backends
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError>;

    /// Decode token ids back into text
    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError>;

    /// Count the tokens in a text
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.encode(text)?.len())
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, TokenizerError> {
        texts.iter().map(|text| self.encode(text)).collect()
    }

    fn decode_batch(&self, batch: &[&[TokenId]]) -> Result<Vec<String>, TokenizerError> {
        batch.iter().map(|tokens| self.decode(tokens)).collect()
    }

    fn count_tokens_batch(&self, texts: &[&str]) -> Result<Vec<usize>, TokenizerError> {
        texts.iter().map(|text| self.count_tokens(text)).collect()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).encode(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        (**self).decode(tokens)
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count_tokens(text)
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, TokenizerError> {
        (**self).encode_batch(texts)
    }

    fn decode_batch(&self, batch: &[&[TokenId]]) -> Result<Vec<String>, TokenizerError> {
        (**self).decode_batch(batch)
    }

    fn count_tokens_batch(&self, texts: &[&str]) -> Result<Vec<usize>, TokenizerError> {
        (**self).count_tokens_batch(texts)
    }
}

/// Shared, thread-safe tokenizer handle
pub type SharedTokenizer = Arc<dyn Tokenizer>;

/// Resolve a tokenizer by name.
///
/// `character` maps one char to one token; anything else is looked up as a
/// tiktoken encoding or model name (`cl100k_base`, `o200k_base`, `gpt-4o`, ...).
/// With the `hf-tokenizers` feature a path ending in `.json` loads a
/// HuggingFace `tokenizer.json`.
pub fn from_name(name: &str) -> Result<SharedTokenizer, ConfigError> {
    match name {
        "character" | "char" => Ok(Arc::new(CharacterTokenizer)),
        #[cfg(feature = "hf-tokenizers")]
        path if path.ends_with(".json") => HfTokenizer::from_file(path)
            .map(|t| Arc::new(t) as SharedTokenizer)
            .map_err(|e| ConfigError::UnknownTokenizer(format!("{}: {}", path, e))),
        other => TiktokenTokenizer::from_name(other)
            .map(|t| Arc::new(t) as SharedTokenizer)
            .map_err(|_| ConfigError::UnknownTokenizer(other.to_string())),
    }
}
