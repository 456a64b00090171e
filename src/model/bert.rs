use ndarray::{s, Array1, Array2, Axis};
use rayon::prelude::*;

use super::config::BertConfig;
use super::types::{EncoderOutput, ModelError};
use super::weights::WeightStore;
use crate::nn::{ops, Activation};
use crate::tokenizer::Encoding;

/// Additive attention bias for padded keys
const MASKED_KEY_BIAS: f32 = -10000.0;

/// Dense layer with weight stored as [out, in]
#[derive(Debug, Clone)]
pub(crate) struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    pub fn load(store: &WeightStore, prefix: &str, out_dim: usize, in_dim: usize) -> Result<Self, ModelError> {
        Ok(Self {
            weight: store.matrix(&format!("{}.weight", prefix), out_dim, in_dim)?,
            bias: store.vector(&format!("{}.bias", prefix), out_dim)?,
        })
    }

    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>, ModelError> {
        Ok(ops::linear(x.view(), self.weight.view(), Some(self.bias.view()))?)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LayerNorm {
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
    pub eps: f32,
}

impl LayerNorm {
    pub fn load(store: &WeightStore, prefix: &str, dim: usize, eps: f32) -> Result<Self, ModelError> {
        Ok(Self {
            gamma: store.vector(&format!("{}.weight", prefix), dim)?,
            beta: store.vector(&format!("{}.bias", prefix), dim)?,
            eps,
        })
    }

    pub fn forward(&self, x: &mut Array2<f32>) -> Result<(), ModelError> {
        Ok(ops::layer_norm(x, self.gamma.view(), self.beta.view(), self.eps)?)
    }
}

struct Embeddings {
    word: Array2<f32>,
    position: Array2<f32>,
    token_type: Array2<f32>,
    norm: LayerNorm,
}

struct EncoderLayer {
    query: Linear,
    key: Linear,
    value: Linear,
    attention_output: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
}

impl EncoderLayer {
    fn load(store: &WeightStore, config: &BertConfig, index: usize) -> Result<Self, ModelError> {
        let h = config.hidden_size;
        let i = config.intermediate_size;
        let eps = config.layer_norm_eps;
        let p = format!("encoder.layer.{}", index);
        Ok(Self {
            query: Linear::load(store, &format!("{}.attention.self.query", p), h, h)?,
            key: Linear::load(store, &format!("{}.attention.self.key", p), h, h)?,
            value: Linear::load(store, &format!("{}.attention.self.value", p), h, h)?,
            attention_output: Linear::load(store, &format!("{}.attention.output.dense", p), h, h)?,
            attention_norm: LayerNorm::load(store, &format!("{}.attention.output.LayerNorm", p), h, eps)?,
            intermediate: Linear::load(store, &format!("{}.intermediate.dense", p), i, h)?,
            output: Linear::load(store, &format!("{}.output.dense", p), h, i)?,
            output_norm: LayerNorm::load(store, &format!("{}.output.LayerNorm", p), h, eps)?,
        })
    }

    fn forward(
        &self,
        x: &Array2<f32>,
        mask_bias: &Array1<f32>,
        num_heads: usize,
        activation: Activation,
    ) -> Result<Array2<f32>, ModelError> {
        let q = self.query.forward(x)?;
        let k = self.key.forward(x)?;
        let v = self.value.forward(x)?;

        let head_dim = x.ncols() / num_heads;
        let scale = 1.0 / (head_dim as f32).sqrt();
        let mut context = Array2::<f32>::zeros(x.raw_dim());
        for head in 0..num_heads {
            let cols = head * head_dim..(head + 1) * head_dim;
            let mut scores = q.slice(s![.., cols.clone()]).dot(&k.slice(s![.., cols.clone()]).t());
            scores *= scale;
            scores += mask_bias;
            ops::softmax_rows(&mut scores);
            let weighted = scores.dot(&v.slice(s![.., cols.clone()]));
            context.slice_mut(s![.., cols]).assign(&weighted);
        }

        let mut attended = self.attention_output.forward(&context)?;
        attended += x;
        self.attention_norm.forward(&mut attended)?;

        let mut hidden = self.intermediate.forward(&attended)?;
        activation.apply(&mut hidden);
        let mut out = self.output.forward(&hidden)?;
        out += &attended;
        self.output_norm.forward(&mut out)?;
        Ok(out)
    }
}

/// BERT encoder: embeddings, transformer layers and the [CLS] pooler
pub struct BertModel {
    config: BertConfig,
    activation: Activation,
    embeddings: Embeddings,
    layers: Vec<EncoderLayer>,
    pooler: Linear,
}

impl BertModel {
    pub fn load(store: &WeightStore, config: BertConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let h = config.hidden_size;
        let eps = config.layer_norm_eps;

        let embeddings = Embeddings {
            word: store.matrix("embeddings.word_embeddings.weight", config.vocab_size, h)?,
            position: store.matrix("embeddings.position_embeddings.weight", config.max_position_embeddings, h)?,
            token_type: store.matrix("embeddings.token_type_embeddings.weight", config.type_vocab_size, h)?,
            norm: LayerNorm::load(store, "embeddings.LayerNorm", h, eps)?,
        };

        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::load(store, &config, i))
            .collect::<Result<Vec<_>, _>>()?;

        let pooler = Linear::load(store, "pooler.dense", h, h)?;

        Ok(Self {
            activation: config.activation()?,
            config,
            embeddings,
            layers,
            pooler,
        })
    }

    pub fn config(&self) -> &BertConfig {
        &self.config
    }

    pub(crate) fn activation(&self) -> Activation {
        self.activation
    }

    /// Word embedding table, [vocab_size, hidden_size]
    pub(crate) fn word_embeddings(&self) -> &Array2<f32> {
        &self.embeddings.word
    }

    fn check_input(&self, encoding: &Encoding) -> Result<(), ModelError> {
        let len = encoding.len();
        if len == 0 {
            return Err(ModelError::InvalidInput("empty sequence".into()));
        }
        if len > self.config.max_position_embeddings {
            return Err(ModelError::SequenceTooLong { length: len, max: self.config.max_position_embeddings });
        }
        if encoding.token_type_ids.len() != len || encoding.attention_mask.len() != len {
            return Err(ModelError::InvalidInput(format!(
                "{} input ids but {} token type ids and {} mask entries",
                len, encoding.token_type_ids.len(), encoding.attention_mask.len()
            )));
        }
        if let Some(&id) = encoding.input_ids.iter().find(|&&id| id as usize >= self.config.vocab_size) {
            return Err(ModelError::InvalidInput(format!(
                "token id {} outside vocabulary of {}", id, self.config.vocab_size
            )));
        }
        if let Some(&t) = encoding.token_type_ids.iter().find(|&&t| t as usize >= self.config.type_vocab_size) {
            return Err(ModelError::InvalidInput(format!(
                "token type {} outside {} segment types", t, self.config.type_vocab_size
            )));
        }
        Ok(())
    }

    /// Runs the encoder over one sequence
    pub fn forward(&self, encoding: &Encoding) -> Result<EncoderOutput, ModelError> {
        self.check_input(encoding)?;
        let len = encoding.len();
        let h = self.config.hidden_size;

        let mut x = Array2::<f32>::zeros((len, h));
        for (pos, mut row) in x.axis_iter_mut(Axis(0)).enumerate() {
            row.assign(&self.embeddings.word.row(encoding.input_ids[pos] as usize));
            row += &self.embeddings.position.row(pos);
            row += &self.embeddings.token_type.row(encoding.token_type_ids[pos] as usize);
        }
        self.embeddings.norm.forward(&mut x)?;

        let mask_bias: Array1<f32> = encoding.attention_mask.iter()
            .map(|&m| if m == 0 { MASKED_KEY_BIAS } else { 0.0 })
            .collect();

        for layer in &self.layers {
            x = layer.forward(&x, &mask_bias, self.config.num_attention_heads, self.activation)?;
        }

        let cls = x.slice(s![0..1, ..]).to_owned();
        let mut pooled = self.pooler.forward(&cls)?;
        Activation::Tanh.apply(&mut pooled);
        let pooler_output = pooled.index_axis_move(Axis(0), 0);

        Ok(EncoderOutput { last_hidden_state: x, pooler_output })
    }

    /// Runs independent sequences in parallel
    pub fn forward_batch(&self, encodings: &[Encoding]) -> Result<Vec<EncoderOutput>, ModelError> {
        encodings.par_iter().map(|e| self.forward(e)).collect()
    }
}
