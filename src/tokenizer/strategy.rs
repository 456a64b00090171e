use std::error::Error;

use super::types::SpecialTokens;

/// Trait defining the interface for all tokenizer implementations
pub trait TokenizerStrategy: Send + Sync {
    /// Split text into vocabulary pieces, without special tokens
    fn tokenize(&self, text: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>>;

    /// Convert text into token IDs, framed by the model's special tokens
    fn encode(&self, text: &str) -> Result<Vec<u32>, Box<dyn Error + Send + Sync>>;

    /// Convert token IDs back into text
    fn decode(&self, tokens: &[u32]) -> Result<String, Box<dyn Error + Send + Sync>>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, id: u32) -> Option<&str>;

    fn vocab_size(&self) -> usize;

    fn special_tokens(&self) -> SpecialTokens;

    /// Longest sequence the model accepts
    fn model_max_length(&self) -> usize;
}
