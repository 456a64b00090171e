use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::strategy::TokenizerStrategy;
use super::types::{BertTokenizerConfig, SpecialTokens, TokenizerError};
use super::utilities::{is_chinese_char, is_control, is_nonspacing_mark, is_punctuation, is_whitespace};

const PAD_TOKEN: &str = "[PAD]";
const UNK_TOKEN: &str = "[UNK]";
const CLS_TOKEN: &str = "[CLS]";
const SEP_TOKEN: &str = "[SEP]";
const MASK_TOKEN: &str = "[MASK]";

/// Prefix marking a piece that continues the previous one
const CONTINUATION_PREFIX: &str = "##";

/// WordPiece tokenizer used by BERT checkpoints
pub struct BertTokenizer {
    vocabulary: HashMap<String, u32>,
    reverse_vocabulary: Vec<String>,
    special: SpecialTokens,
    config: BertTokenizerConfig,
}

impl BertTokenizer {
    /// Builds a tokenizer from an ordered token list; the index is the id
    pub fn new(tokens: Vec<String>, config: BertTokenizerConfig) -> Result<Self, TokenizerError> {
        if tokens.is_empty() {
            return Err(TokenizerError::EmptyVocabulary);
        }

        let mut vocabulary = HashMap::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            // First occurrence wins on duplicates
            vocabulary.entry(token.clone()).or_insert(i as u32);
        }

        let lookup = |t: &str| {
            vocabulary.get(t).copied()
                .ok_or_else(|| TokenizerError::MissingSpecialToken(t.to_string()))
        };
        let special = SpecialTokens {
            pad: lookup(PAD_TOKEN)?,
            unk: lookup(UNK_TOKEN)?,
            cls: lookup(CLS_TOKEN)?,
            sep: lookup(SEP_TOKEN)?,
            mask: vocabulary.get(MASK_TOKEN).copied(),
        };

        Ok(Self {
            vocabulary,
            reverse_vocabulary: tokens,
            special,
            config,
        })
    }

    /// Loads `vocab.txt` and an optional `tokenizer_config.json`
    pub fn from_files(vocab_path: &Path, config_path: Option<&Path>) -> Result<Self, TokenizerError> {
        let config = match config_path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                serde_json::from_str(&raw)
                    .map_err(|e| TokenizerError::InvalidConfig(format!("{}: {}", path.display(), e)))?
            }
            None => BertTokenizerConfig::default(),
        };

        let raw = fs::read_to_string(vocab_path)?;
        let tokens: Vec<String> = raw.lines().map(str::to_string).collect();
        debug!("Read {} vocabulary entries from {}", tokens.len(), vocab_path.display());

        Self::new(tokens, config)
    }

    pub fn config(&self) -> &BertTokenizerConfig {
        &self.config
    }

    /// Whitespace and punctuation splitting that runs before WordPiece
    fn basic_tokenize(&self, text: &str) -> Vec<String> {
        let mut cleaned = String::with_capacity(text.len());
        for c in text.chars() {
            if c == '\0' || c == '\u{FFFD}' || is_control(c) {
                continue;
            }
            if is_whitespace(c) {
                cleaned.push(' ');
            } else if self.config.tokenize_chinese_chars && is_chinese_char(c) {
                cleaned.push(' ');
                cleaned.push(c);
                cleaned.push(' ');
            } else {
                cleaned.push(c);
            }
        }

        let mut words = Vec::new();
        for word in cleaned.split_whitespace() {
            let word = if self.config.do_lower_case {
                word.to_lowercase().chars().filter(|&c| !is_nonspacing_mark(c)).collect()
            } else {
                word.to_string()
            };
            split_on_punctuation(&word, &mut words);
        }
        words
    }

    /// Greedy longest-match-first segmentation of one word
    fn wordpiece(&self, word: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > self.config.max_input_chars_per_word {
            out.push(UNK_TOKEN.to_string());
            return;
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while start < end {
                let mut candidate: String = chars[start..end].iter().collect();
                if start > 0 {
                    candidate.insert_str(0, CONTINUATION_PREFIX);
                }
                if self.vocabulary.contains_key(&candidate) {
                    found = Some(candidate);
                    break;
                }
                end -= 1;
            }
            match found {
                Some(piece) => {
                    pieces.push(piece);
                    start = end;
                }
                None => {
                    out.push(UNK_TOKEN.to_string());
                    return;
                }
            }
        }
        out.extend(pieces);
    }
}

fn split_on_punctuation(word: &str, out: &mut Vec<String>) {
    let mut current = String::new();
    for c in word.chars() {
        if is_punctuation(c) {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Undo the spaces decoding leaves before punctuation and contractions
fn clean_up_tokenization(text: String) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}

impl TokenizerStrategy for BertTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let mut pieces = Vec::new();
        for word in self.basic_tokenize(text) {
            self.wordpiece(&word, &mut pieces);
        }
        Ok(pieces)
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>, Box<dyn Error + Send + Sync>> {
        let pieces = self.tokenize(text)?;
        let mut tokens = Vec::with_capacity(pieces.len() + 2);
        tokens.push(self.special.cls);
        tokens.extend(pieces.iter().map(|p| self.token_to_id(p).unwrap_or(self.special.unk)));
        tokens.push(self.special.sep);
        Ok(tokens)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut text = String::new();
        for &token_id in tokens {
            if self.special.contains(token_id) {
                continue;
            }
            let piece = self.id_to_token(token_id)
                .ok_or(TokenizerError::UnknownId(token_id))?;
            match piece.strip_prefix(CONTINUATION_PREFIX) {
                Some(rest) => text.push_str(rest),
                None => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(piece);
                }
            }
        }
        Ok(clean_up_tokenization(text))
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocabulary.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.reverse_vocabulary.get(id as usize).map(String::as_str)
    }

    fn vocab_size(&self) -> usize {
        self.reverse_vocabulary.len()
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn model_max_length(&self) -> usize {
        self.config.model_max_length
    }
}
