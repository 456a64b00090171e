//! Pretrained `bert-base-cased` tokenizer and encoder with a trainable
//! dense projection head for document retrieval.

pub mod cli;
pub mod config;
pub mod document_encoder;
pub mod embedder;
pub mod hub;
pub mod model;
pub mod nn;
pub mod safetensors;
pub mod tokenizer;

pub use config::{Settings, MODEL_TYPE};
pub use document_encoder::DocumentEncoder;
pub use embedder::{create_embedder, DocumentEmbedder};
pub use model::create_encoder;
pub use tokenizer::create_tokenizer;
