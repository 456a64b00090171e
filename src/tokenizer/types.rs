use std::error::Error;
use std::fmt;
use serde::Deserialize;

/// Settings read from `tokenizer_config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct BertTokenizerConfig {
    /// Lowercase input and strip accents before WordPiece
    #[serde(default)]
    pub do_lower_case: bool,
    /// Put spaces around CJK ideographs so each becomes its own word
    #[serde(default = "default_true")]
    pub tokenize_chinese_chars: bool,
    /// Longest sequence the checkpoint was trained on
    #[serde(default = "default_model_max_length")]
    pub model_max_length: usize,
    /// Words longer than this map straight to the unknown token
    #[serde(default = "default_max_input_chars_per_word")]
    pub max_input_chars_per_word: usize,
}

fn default_true() -> bool {
    true
}

fn default_model_max_length() -> usize {
    512
}

fn default_max_input_chars_per_word() -> usize {
    100
}

impl Default for BertTokenizerConfig {
    fn default() -> Self {
        Self {
            do_lower_case: false,
            tokenize_chinese_chars: true,
            model_max_length: default_model_max_length(),
            max_input_chars_per_word: default_max_input_chars_per_word(),
        }
    }
}

/// Ids of the tokens BERT reserves for sequence structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: u32,
    pub unk: u32,
    pub cls: u32,
    pub sep: u32,
    pub mask: Option<u32>,
}

impl SpecialTokens {
    /// Whether `id` is one of the reserved tokens, `[UNK]` included
    pub fn contains(&self, id: u32) -> bool {
        id == self.pad || id == self.unk || id == self.cls || id == self.sep || Some(id) == self.mask
    }
}

/// Model-ready input for one sequence (or sequence pair)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    /// 0 for the first segment, 1 for the pair segment
    pub token_type_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Right-pads to `length`; longer encodings are left untouched
    pub fn pad_to(&mut self, length: usize, pad_id: u32) {
        if self.len() >= length {
            return;
        }
        self.input_ids.resize(length, pad_id);
        self.token_type_ids.resize(length, 0);
        self.attention_mask.resize(length, 0);
    }
}

/// Custom error types for tokenizer operations
#[derive(Debug)]
pub enum TokenizerError {
    /// Wraps std::io::Error for vocabulary and config files
    IoError(std::io::Error),
    /// Vocabulary file had no entries
    EmptyVocabulary,
    /// A required special token is absent from the vocabulary
    MissingSpecialToken(String),
    /// Config file could not be parsed
    InvalidConfig(String),
    /// Id has no vocabulary entry
    UnknownId(u32),
    /// Requested length cannot hold the special tokens
    InvalidLength { max_length: usize, required: usize },
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenizerError::IoError(e) => write!(f, "I/O error: {}", e),
            TokenizerError::EmptyVocabulary => write!(f, "Vocabulary is empty"),
            TokenizerError::MissingSpecialToken(t) => write!(f, "Vocabulary lacks special token {}", t),
            TokenizerError::InvalidConfig(msg) => write!(f, "Invalid tokenizer config: {}", msg),
            TokenizerError::UnknownId(id) => write!(f, "Unknown token id: {}", id),
            TokenizerError::InvalidLength { max_length, required } => write!(
                f, "max_length {} cannot hold the {} special tokens", max_length, required
            ),
        }
    }
}

impl Error for TokenizerError {}

impl From<std::io::Error> for TokenizerError {
    fn from(err: std::io::Error) -> Self {
        TokenizerError::IoError(err)
    }
}
