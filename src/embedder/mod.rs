mod index;
mod types;

pub use index::{EmbeddingIndex, SearchResult};
pub use types::{EmbedderError, Pooling};

use std::error::Error;

use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

use crate::config::Settings;
use crate::document_encoder::DocumentEncoder;
use crate::model::{create_encoder, BertForPreTraining};
use crate::nn::ops;
use crate::tokenizer::{create_tokenizer, Tokenizer};

/// Knobs for turning texts into vectors
#[derive(Debug, Clone)]
pub struct EmbedderOptions {
    pub pooling: Pooling,
    /// Token budget per text, special tokens included
    pub max_length: usize,
    pub normalize: bool,
    /// Seed for a head that still needs initialization
    pub seed: u64,
}

impl EmbedderOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, EmbedderError> {
        Ok(Self {
            pooling: Pooling::parse(&settings.encoder.pooling)?,
            max_length: settings.encoder.max_sequence_length,
            normalize: settings.document_encoder.normalize,
            seed: settings.document_encoder.seed,
        })
    }
}

impl Default for EmbedderOptions {
    fn default() -> Self {
        Self { pooling: Pooling::Cls, max_length: 512, normalize: true, seed: 0 }
    }
}

/// Tokenizer, pretrained encoder and projection head chained into one pipeline
pub struct DocumentEmbedder {
    tokenizer: Tokenizer,
    encoder: BertForPreTraining,
    head: DocumentEncoder,
    options: EmbedderOptions,
}

impl DocumentEmbedder {
    /// Sets the head up for the encoder's hidden size if it is not already
    pub fn new(
        tokenizer: Tokenizer,
        encoder: BertForPreTraining,
        mut head: DocumentEncoder,
        mut options: EmbedderOptions,
    ) -> Result<Self, EmbedderError> {
        let hidden = encoder.config().hidden_size;
        match head.input_dim() {
            Some(dim) if dim != hidden => {
                return Err(EmbedderError::Dimension { expected: hidden, actual: dim });
            }
            Some(_) => {}
            None => head.setup(hidden, options.seed)?,
        }
        options.max_length = options.max_length.min(encoder.config().max_position_embeddings);

        Ok(Self { tokenizer, encoder, head, options })
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn encoder(&self) -> &BertForPreTraining {
        &self.encoder
    }

    pub fn head(&self) -> &DocumentEncoder {
        &self.head
    }

    pub fn options(&self) -> &EmbedderOptions {
        &self.options
    }

    /// Width of the vectors `embed` produces
    pub fn dim(&self) -> usize {
        self.head.output_dim().unwrap_or(self.encoder.config().hidden_size)
    }

    /// One row per text: pooled encoder state, projected, optionally unit length
    pub fn embed<S: AsRef<str>>(&self, texts: &[S]) -> Result<Array2<f32>, EmbedderError> {
        let hidden = self.encoder.config().hidden_size;
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.dim())));
        }

        let encodings = self.tokenizer
            .encode_batch(texts, Some(self.options.max_length))
            .map_err(EmbedderError::Tokenizer)?;
        debug!("Encoding {} texts padded to {} tokens", texts.len(), encodings[0].len());
        let outputs = self.encoder.encode_batch(&encodings)?;

        let mut pooled = Array2::<f32>::zeros((texts.len(), hidden));
        for ((mut row, output), encoding) in pooled.axis_iter_mut(Axis(0)).zip(&outputs).zip(&encodings) {
            match self.options.pooling {
                Pooling::Cls => row.assign(&output.last_hidden_state.row(0)),
                Pooling::Mean => row.assign(&ops::masked_mean(
                    output.last_hidden_state.view(),
                    &encoding.attention_mask,
                )),
            }
        }

        let mut projected = self.head.apply(pooled.view())?;
        if self.options.normalize {
            ops::l2_normalize(&mut projected);
        }
        Ok(projected)
    }

    pub fn embed_one(&self, text: &str) -> Result<Array1<f32>, EmbedderError> {
        Ok(self.embed(&[text])?.index_axis_move(Axis(0), 0))
    }

    /// Dot-product score of `query` against each document, in input order
    pub fn score<S: AsRef<str>>(&self, query: &str, documents: &[S]) -> Result<Vec<f32>, EmbedderError> {
        let q = self.embed_one(query)?;
        let docs = self.embed(documents)?;
        Ok(docs.dot(&q).to_vec())
    }

    /// Embeds `(id, text)` pairs into a fresh index
    pub fn build_index<I, S>(&self, documents: &[(I, S)]) -> Result<EmbeddingIndex, EmbedderError>
    where
        I: AsRef<str>,
        S: AsRef<str>,
    {
        let texts: Vec<&str> = documents.iter().map(|(_, t)| t.as_ref()).collect();
        let vectors = self.embed(&texts)?;
        let mut index = EmbeddingIndex::new(self.dim());
        for ((id, _), vector) in documents.iter().zip(vectors.axis_iter(Axis(0))) {
            index.add(id.as_ref(), vector)?;
        }
        info!("Indexed {} documents ({} dimensions)", index.len(), index.dim());
        Ok(index)
    }

    pub fn search(&self, index: &EmbeddingIndex, query: &str, k: usize) -> Result<Vec<SearchResult>, EmbedderError> {
        let q = self.embed_one(query)?;
        index.search(q.view(), k)
    }
}

/// Builds the whole pipeline for the configured checkpoint
pub async fn create_embedder(settings: &Settings) -> Result<DocumentEmbedder, Box<dyn Error + Send + Sync>> {
    let tokenizer = create_tokenizer(settings).await?;
    let encoder = create_encoder(settings).await?;

    let dimensions = settings.document_encoder.dimensions.clone();
    let head = match &settings.document_encoder.checkpoint {
        Some(path) if path.exists() => {
            info!("Loading document encoder from {}", path.display());
            DocumentEncoder::load(path, dimensions)?
        }
        _ => DocumentEncoder::new(dimensions),
    };

    let options = EmbedderOptions::from_settings(settings)?;
    Ok(DocumentEmbedder::new(tokenizer, encoder, head, options)?)
}
