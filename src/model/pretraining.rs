use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{info, warn};

use super::bert::{BertModel, LayerNorm, Linear};
use super::config::BertConfig;
use super::types::{EncoderOutput, ModelError, PreTrainingOutput};
use super::weights::WeightStore;
use crate::tokenizer::Encoding;

const PREDICTION_BIAS: &str = "cls.predictions.bias";
const PREDICTION_DECODER: &str = "cls.predictions.decoder.weight";

/// Masked-LM transform and next-sentence classifier on top of the encoder
struct PreTrainingHeads {
    transform: Linear,
    transform_norm: LayerNorm,
    /// Untied decoder; `None` reuses the word embeddings
    decoder: Option<Array2<f32>>,
    prediction_bias: Array1<f32>,
    seq_relationship: Linear,
}

impl PreTrainingHeads {
    fn load(store: &WeightStore, config: &BertConfig) -> Result<Self, ModelError> {
        let h = config.hidden_size;
        let decoder = if store.contains(PREDICTION_DECODER) {
            Some(store.matrix(PREDICTION_DECODER, config.vocab_size, h)?)
        } else {
            None
        };
        Ok(Self {
            transform: Linear::load(store, "cls.predictions.transform.dense", h, h)?,
            transform_norm: LayerNorm::load(store, "cls.predictions.transform.LayerNorm", h, config.layer_norm_eps)?,
            decoder,
            prediction_bias: store.vector(PREDICTION_BIAS, config.vocab_size)?,
            seq_relationship: Linear::load(store, "cls.seq_relationship", 2, h)?,
        })
    }
}

/// Pretrained BERT with its masked-LM and next-sentence heads
pub struct BertForPreTraining {
    bert: BertModel,
    heads: Option<PreTrainingHeads>,
}

impl BertForPreTraining {
    /// Loads from a `config.json` and a safetensors checkpoint.
    ///
    /// Checkpoints without pretraining heads still load; only `forward`
    /// needs them.
    pub fn from_files(config_path: &Path, weights_path: &Path) -> Result<Self, ModelError> {
        let config = BertConfig::from_file(config_path)?;
        let store = WeightStore::open(weights_path)?;
        info!(
            "Loading BERT encoder: {} layers, hidden {}, vocab {} ({} tensors in {})",
            config.num_hidden_layers,
            config.hidden_size,
            config.vocab_size,
            store.tensor_count(),
            weights_path.display()
        );

        let heads = match PreTrainingHeads::load(&store, &config) {
            Ok(heads) => Some(heads),
            Err(ModelError::MissingWeight(name)) => {
                warn!("Checkpoint has no pretraining heads ({} missing); encoder-only", name);
                None
            }
            Err(e) => return Err(e),
        };
        let bert = BertModel::load(&store, config)?;

        Ok(Self { bert, heads })
    }

    pub fn config(&self) -> &BertConfig {
        self.bert.config()
    }

    pub fn bert(&self) -> &BertModel {
        &self.bert
    }

    pub fn has_pretraining_heads(&self) -> bool {
        self.heads.is_some()
    }

    /// Encoder states only
    pub fn encode(&self, encoding: &Encoding) -> Result<EncoderOutput, ModelError> {
        self.bert.forward(encoding)
    }

    pub fn encode_batch(&self, encodings: &[Encoding]) -> Result<Vec<EncoderOutput>, ModelError> {
        self.bert.forward_batch(encodings)
    }

    /// Encoder states plus masked-LM and next-sentence logits
    pub fn forward(&self, encoding: &Encoding) -> Result<PreTrainingOutput, ModelError> {
        let heads = self.heads.as_ref()
            .ok_or_else(|| ModelError::MissingWeight(PREDICTION_BIAS.to_string()))?;
        let hidden = self.bert.forward(encoding)?;

        let mut transformed = heads.transform.forward(&hidden.last_hidden_state)?;
        self.bert.activation().apply(&mut transformed);
        heads.transform_norm.forward(&mut transformed)?;

        let decoder = heads.decoder.as_ref().unwrap_or_else(|| self.bert.word_embeddings());
        let mut prediction_logits = transformed.dot(&decoder.t());
        prediction_logits += &heads.prediction_bias;

        let pooled = hidden.pooler_output.clone().insert_axis(Axis(0));
        let seq_relationship_logits = heads.seq_relationship
            .forward(&pooled)?
            .index_axis_move(Axis(0), 0);

        Ok(PreTrainingOutput { prediction_logits, seq_relationship_logits, hidden })
    }

    pub fn forward_batch(&self, encodings: &[Encoding]) -> Result<Vec<PreTrainingOutput>, ModelError> {
        encodings.par_iter().map(|e| self.forward(e)).collect()
    }
}
