//! Miniature checkpoint fixtures shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrieval::config::{
    DocumentEncoderConfig, EncoderConfig, LoggingConfig, ModelConfig, Settings,
};
use retrieval::safetensors::SafeTensorsWriter;

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]",
    "the", "cat", "dog", "sat", "on", "mat", "##s", "run", "fast", ".", "a",
];

pub const HIDDEN: usize = 8;
pub const HEADS: usize = 2;
pub const INTERMEDIATE: usize = 16;
pub const LAYERS: usize = 2;
pub const MAX_POSITIONS: usize = 32;

pub fn id(token: &str) -> u32 {
    VOCAB.iter().position(|t| *t == token).expect("token in fixture vocab") as u32
}

struct Weights {
    writer: SafeTensorsWriter,
    rng: StdRng,
}

impl Weights {
    fn random(&mut self, name: &str, shape: Vec<usize>) {
        let n = shape.iter().product();
        let values = (0..n).map(|_| self.rng.random_range(-0.2f32..0.2)).collect();
        self.writer.add_tensor(name, shape, values).unwrap();
    }

    fn linear(&mut self, prefix: &str, out_dim: usize, in_dim: usize) {
        self.random(&format!("{}.weight", prefix), vec![out_dim, in_dim]);
        self.random(&format!("{}.bias", prefix), vec![out_dim]);
    }

    /// Older checkpoints spell LayerNorm parameters gamma/beta
    fn layer_norm(&mut self, prefix: &str) {
        self.writer.add_tensor(format!("{}.gamma", prefix), vec![HIDDEN], vec![1.0; HIDDEN]).unwrap();
        self.writer.add_tensor(format!("{}.beta", prefix), vec![HIDDEN], vec![0.0; HIDDEN]).unwrap();
    }
}

/// Writes vocab.txt, config.json and a random model.safetensors into `dir`.
///
/// Encoder tensors carry the `bert.` prefix. With `with_heads` the masked-LM
/// and next-sentence heads are included, the decoder tied to the embeddings.
pub fn write_checkpoint(dir: &Path, with_heads: bool) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("vocab.txt"), VOCAB.join("\n")).unwrap();

    let config = serde_json::json!({
        "vocab_size": VOCAB.len(),
        "hidden_size": HIDDEN,
        "num_hidden_layers": LAYERS,
        "num_attention_heads": HEADS,
        "intermediate_size": INTERMEDIATE,
        "max_position_embeddings": MAX_POSITIONS,
        "type_vocab_size": 2,
        "hidden_act": "gelu",
        "layer_norm_eps": 1e-12,
    });
    fs::write(dir.join("config.json"), serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let mut w = Weights { writer: SafeTensorsWriter::new(), rng: StdRng::seed_from_u64(7) };
    w.random("bert.embeddings.word_embeddings.weight", vec![VOCAB.len(), HIDDEN]);
    w.random("bert.embeddings.position_embeddings.weight", vec![MAX_POSITIONS, HIDDEN]);
    w.random("bert.embeddings.token_type_embeddings.weight", vec![2, HIDDEN]);
    w.layer_norm("bert.embeddings.LayerNorm");

    for i in 0..LAYERS {
        let p = format!("bert.encoder.layer.{}", i);
        w.linear(&format!("{}.attention.self.query", p), HIDDEN, HIDDEN);
        w.linear(&format!("{}.attention.self.key", p), HIDDEN, HIDDEN);
        w.linear(&format!("{}.attention.self.value", p), HIDDEN, HIDDEN);
        w.linear(&format!("{}.attention.output.dense", p), HIDDEN, HIDDEN);
        w.layer_norm(&format!("{}.attention.output.LayerNorm", p));
        w.linear(&format!("{}.intermediate.dense", p), INTERMEDIATE, HIDDEN);
        w.linear(&format!("{}.output.dense", p), HIDDEN, INTERMEDIATE);
        w.layer_norm(&format!("{}.output.LayerNorm", p));
    }
    w.linear("bert.pooler.dense", HIDDEN, HIDDEN);

    if with_heads {
        w.linear("cls.predictions.transform.dense", HIDDEN, HIDDEN);
        w.layer_norm("cls.predictions.transform.LayerNorm");
        w.random("cls.predictions.bias", vec![VOCAB.len()]);
        w.linear("cls.seq_relationship", 2, HIDDEN);
    }

    w.writer.add_metadata("format", "pt");
    w.writer.write(dir.join("model.safetensors")).unwrap();
}

/// Offline settings pointing at `model_id`, caching under `root/cache`
pub fn settings(root: &Path, model_id: &str) -> Settings {
    let cache_dir = root.join("cache");
    fs::create_dir_all(&cache_dir).unwrap();
    Settings {
        model: ModelConfig {
            id: model_id.to_string(),
            revision: "main".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            cache_dir,
            offline: true,
        },
        encoder: EncoderConfig {
            max_sequence_length: MAX_POSITIONS,
            pooling: "cls".to_string(),
        },
        document_encoder: DocumentEncoderConfig {
            dimensions: vec![6, 4],
            seed: 3,
            normalize: true,
            checkpoint: None,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
    }
}

/// Checkpoint written straight into a directory used as the model id
pub fn local_checkpoint(root: &Path, with_heads: bool) -> (PathBuf, Settings) {
    let dir = root.join("bert-mini");
    write_checkpoint(&dir, with_heads);
    let settings = settings(root, &dir.display().to_string());
    (dir, settings)
}
