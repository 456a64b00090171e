mod common;

use std::fs;

use common::{id, local_checkpoint, settings, write_checkpoint, HIDDEN, MAX_POSITIONS, VOCAB};
use retrieval::hub::{HubClient, HubError};
use retrieval::model::ModelError;
use retrieval::tokenizer::Encoding;
use retrieval::{create_encoder, create_tokenizer, MODEL_TYPE};

#[tokio::test]
async fn test_tokenizer_from_local_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), true);

    let tokenizer = create_tokenizer(&settings).await.unwrap();
    assert_eq!(tokenizer.vocab_size(), VOCAB.len());

    let ids = tokenizer.encode("the cats sat").unwrap();
    assert_eq!(ids, vec![id("[CLS]"), id("the"), id("cat"), id("##s"), id("sat"), id("[SEP]")]);
    assert_eq!(tokenizer.decode(&ids).unwrap(), "the cats sat");
}

#[tokio::test]
async fn test_tokenizer_from_offline_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path(), MODEL_TYPE);
    let hub = HubClient::new(&settings.model).unwrap();
    let cached = hub.cache().file_path(MODEL_TYPE, "main", "vocab.txt");
    write_checkpoint(cached.parent().unwrap(), false);

    let tokenizer = create_tokenizer(&settings).await.unwrap();
    assert_eq!(tokenizer.tokenize("the dog run fast.").unwrap(), vec!["the", "dog", "run", "fast", "."]);

    let entries = hub.cache().entries().unwrap();
    assert!(entries.iter().any(|e| e.filename == "vocab.txt" && e.model_id == MODEL_TYPE));
}

#[tokio::test]
async fn test_offline_without_cache_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path(), MODEL_TYPE);

    let err = create_tokenizer(&settings).await.err().unwrap();
    let hub_err = err.downcast_ref::<HubError>().unwrap();
    assert!(matches!(hub_err, HubError::NotCached { filename, .. } if filename == "vocab.txt"));
}

#[tokio::test]
async fn test_encoder_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), true);
    let tokenizer = create_tokenizer(&settings).await.unwrap();
    let encoder = create_encoder(&settings).await.unwrap();

    assert_eq!(encoder.config().hidden_size, HIDDEN);
    assert!(encoder.has_pretraining_heads());

    let encoding = tokenizer.encode_with_options("the cat sat on a mat", None, None).unwrap();
    let out = encoder.encode(&encoding).unwrap();
    assert_eq!(out.last_hidden_state.dim(), (encoding.len(), HIDDEN));
    assert_eq!(out.pooler_output.len(), HIDDEN);
    // tanh pooler
    assert!(out.pooler_output.iter().all(|v| v.abs() <= 1.0));

    let pre = encoder.forward(&encoding).unwrap();
    assert_eq!(pre.prediction_logits.dim(), (encoding.len(), VOCAB.len()));
    assert_eq!(pre.seq_relationship_logits.len(), 2);
}

#[tokio::test]
async fn test_pair_segments_change_states() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), true);
    let tokenizer = create_tokenizer(&settings).await.unwrap();
    let encoder = create_encoder(&settings).await.unwrap();

    let pair = tokenizer.encode_with_options("the cat", Some("the cat"), None).unwrap();
    let mut single = pair.clone();
    single.token_type_ids = vec![0; pair.len()];

    let a = encoder.encode(&pair).unwrap().last_hidden_state;
    let b = encoder.encode(&single).unwrap().last_hidden_state;
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_padding_does_not_leak_into_states() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), false);
    let tokenizer = create_tokenizer(&settings).await.unwrap();
    let encoder = create_encoder(&settings).await.unwrap();

    let short = tokenizer.encode_with_options("the cat", None, None).unwrap();
    let batch = tokenizer.encode_batch(&["the cat", "a dog sat on the mat ."], None).unwrap();
    assert!(batch[0].len() > short.len());
    assert_eq!(batch[0].attention_mask.iter().filter(|&&m| m == 1).count(), short.len());

    let alone = encoder.encode(&short).unwrap().last_hidden_state;
    let padded = encoder.encode_batch(&batch).unwrap().remove(0).last_hidden_state;
    for (i, row) in alone.rows().into_iter().enumerate() {
        for (a, b) in row.iter().zip(padded.row(i).iter()) {
            assert!((a - b).abs() < 1e-4, "position {}: {} vs {}", i, a, b);
        }
    }
}

#[tokio::test]
async fn test_encoder_without_heads() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), false);
    let encoder = create_encoder(&settings).await.unwrap();
    assert!(!encoder.has_pretraining_heads());

    let encoding = Encoding {
        input_ids: vec![id("[CLS]"), id("cat"), id("[SEP]")],
        token_type_ids: vec![0; 3],
        attention_mask: vec![1; 3],
    };
    assert!(encoder.encode(&encoding).is_ok());
    assert!(matches!(encoder.forward(&encoding), Err(ModelError::MissingWeight(_))));
}

#[tokio::test]
async fn test_encoder_rejects_bad_input() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, settings) = local_checkpoint(tmp.path(), false);
    let encoder = create_encoder(&settings).await.unwrap();

    let long = MAX_POSITIONS + 1;
    let too_long = Encoding {
        input_ids: vec![id("a"); long],
        token_type_ids: vec![0; long],
        attention_mask: vec![1; long],
    };
    assert!(matches!(
        encoder.encode(&too_long),
        Err(ModelError::SequenceTooLong { length, max }) if length == long && max == MAX_POSITIONS
    ));

    let out_of_vocab = Encoding {
        input_ids: vec![VOCAB.len() as u32],
        token_type_ids: vec![0],
        attention_mask: vec![1],
    };
    assert!(matches!(encoder.encode(&out_of_vocab), Err(ModelError::InvalidInput(_))));
    assert!(matches!(encoder.encode(&Encoding::default()), Err(ModelError::InvalidInput(_))));
}

#[tokio::test]
async fn test_encoder_missing_weights_file() {
    let tmp = tempfile::tempdir().unwrap();
    let (dir, settings) = local_checkpoint(tmp.path(), true);
    fs::remove_file(dir.join("model.safetensors")).unwrap();

    let err = create_encoder(&settings).await.err().unwrap();
    assert!(matches!(err.downcast_ref::<HubError>(), Some(HubError::NotFound(_))));
}
