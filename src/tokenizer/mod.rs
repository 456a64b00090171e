mod bert;
mod strategy;
mod types;
mod utilities;

pub use bert::BertTokenizer;
pub use strategy::TokenizerStrategy;
pub use types::{BertTokenizerConfig, Encoding, SpecialTokens, TokenizerError};

use std::error::Error;
use std::path::Path;

use tracing::info;

use crate::config::Settings;
use crate::hub::HubClient;

/// Files a WordPiece checkpoint ships its tokenizer in
pub const VOCAB_FILE: &str = "vocab.txt";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// A tokenizer that converts text to model-ready sequences and back
pub struct Tokenizer {
    strategy: Box<dyn TokenizerStrategy>,
}

impl Tokenizer {
    pub fn new(strategy: Box<dyn TokenizerStrategy>) -> Self {
        Self { strategy }
    }

    /// Builds a WordPiece tokenizer from local files
    pub fn from_files(vocab_path: &Path, config_path: Option<&Path>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let strategy = BertTokenizer::from_files(vocab_path, config_path)?;
        info!("Tokenizer ready: {} vocabulary entries", strategy.vocab_size());
        Ok(Self::new(Box::new(strategy)))
    }

    // Delegate to the strategy
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        self.strategy.tokenize(text)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>, Box<dyn Error + Send + Sync>> {
        self.strategy.encode(text)
    }

    pub fn decode(&self, tokens: &[u32]) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.strategy.decode(tokens)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.strategy.token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.strategy.id_to_token(id)
    }

    pub fn vocab_size(&self) -> usize {
        self.strategy.vocab_size()
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.strategy.special_tokens()
    }

    pub fn model_max_length(&self) -> usize {
        self.strategy.model_max_length()
    }

    /// Encodes one sequence or a sequence pair.
    ///
    /// Layout is `[CLS] a [SEP]` or `[CLS] a [SEP] b [SEP]`. With `max_length`
    /// set, tokens are dropped from the end of the longer segment until the
    /// whole encoding fits; on a tie the pair segment gives way.
    pub fn encode_with_options(
        &self,
        text: &str,
        pair: Option<&str>,
        max_length: Option<usize>,
    ) -> Result<Encoding, Box<dyn Error + Send + Sync>> {
        let special = self.special_tokens();
        let mut first = self.piece_ids(text)?;
        let mut second = match pair {
            Some(p) => Some(self.piece_ids(p)?),
            None => None,
        };

        let required = if second.is_some() { 3 } else { 2 };
        if let Some(max_length) = max_length {
            if max_length < required {
                return Err(Box::new(TokenizerError::InvalidLength { max_length, required }));
            }
            let budget = max_length - required;
            loop {
                let second_len = second.as_ref().map_or(0, Vec::len);
                if first.len() + second_len <= budget {
                    break;
                }
                match second.as_mut() {
                    Some(b) if b.len() >= first.len() => {
                        b.pop();
                    }
                    _ => {
                        first.pop();
                    }
                }
            }
        }

        let mut encoding = Encoding::default();
        encoding.input_ids.push(special.cls);
        encoding.input_ids.extend(&first);
        encoding.input_ids.push(special.sep);
        encoding.token_type_ids.resize(encoding.input_ids.len(), 0);
        if let Some(b) = second {
            encoding.input_ids.extend(&b);
            encoding.input_ids.push(special.sep);
            encoding.token_type_ids.resize(encoding.input_ids.len(), 1);
        }
        encoding.attention_mask = vec![1; encoding.input_ids.len()];
        Ok(encoding)
    }

    /// Encodes several texts and right-pads them to the longest one
    pub fn encode_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        max_length: Option<usize>,
    ) -> Result<Vec<Encoding>, Box<dyn Error + Send + Sync>> {
        let mut encodings = texts.iter()
            .map(|t| self.encode_with_options(t.as_ref(), None, max_length))
            .collect::<Result<Vec<_>, _>>()?;

        let longest = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        let pad = self.special_tokens().pad;
        for encoding in &mut encodings {
            encoding.pad_to(longest, pad);
        }
        Ok(encodings)
    }

    fn piece_ids(&self, text: &str) -> Result<Vec<u32>, Box<dyn Error + Send + Sync>> {
        let unk = self.special_tokens().unk;
        Ok(self.strategy.tokenize(text)?
            .iter()
            .map(|piece| self.strategy.token_to_id(piece).unwrap_or(unk))
            .collect())
    }
}

/// Creates the tokenizer for the configured checkpoint.
///
/// `vocab.txt` is required; `tokenizer_config.json` is optional and falls
/// back to cased defaults when the checkpoint does not publish one.
pub async fn create_tokenizer(settings: &Settings) -> Result<Tokenizer, Box<dyn Error + Send + Sync>> {
    let hub = HubClient::new(&settings.model)?;
    let model_id = &settings.model.id;

    let vocab = hub.resolve(model_id, VOCAB_FILE).await?;
    let config = hub.resolve_optional(model_id, TOKENIZER_CONFIG_FILE).await?;

    Tokenizer::from_files(&vocab, config.as_deref())
}
