//! BPE tokenization using tiktoken

use tiktoken_rs::CoreBPE;

use super::{TokenId, Tokenizer};
use crate::error::TokenizerError;

/// tiktoken-backed tokenizer
pub struct TiktokenTokenizer {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load an encoding by encoding name or model name.
    ///
    /// Model names may carry an Ollama-style tag (`gpt-4o:latest`), which is ignored.
    pub fn from_name(name: &str) -> Result<Self, TokenizerError> {
        let base_name = name.split(':').next().unwrap_or(name);

        let bpe = match base_name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            model => tiktoken_rs::get_bpe_from_model(model),
        }
        .map_err(|e| TokenizerError::Load(e.to_string()))?;

        Ok(Self {
            name: base_name.to_string(),
            bpe,
        })
    }

    /// Default encoding used by recent OpenAI models
    pub fn cl100k() -> Result<Self, TokenizerError> {
        Self::from_name("cl100k_base")
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("name", &self.name)
            .finish()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(self.bpe.encode_with_special_tokens(text))
    }

    // Windows that cut through a multi-byte character fail to decode; the
    // error propagates rather than being papered over with lossy text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}
