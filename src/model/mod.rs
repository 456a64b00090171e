mod bert;
mod config;
mod pretraining;
mod types;
mod weights;

pub use bert::BertModel;
pub use config::BertConfig;
pub use pretraining::BertForPreTraining;
pub use types::{EncoderOutput, ModelError, PreTrainingOutput};
pub use weights::WeightStore;

use std::error::Error;

use crate::config::Settings;
use crate::hub::HubClient;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Creates the pretrained encoder for the configured checkpoint
pub async fn create_encoder(settings: &Settings) -> Result<BertForPreTraining, Box<dyn Error + Send + Sync>> {
    let hub = HubClient::new(&settings.model)?;
    let paths = hub.resolve_all(&settings.model.id, &[CONFIG_FILE, WEIGHTS_FILE]).await?;

    // Weight loading is blocking file and CPU work
    let (config, weights) = (paths[0].clone(), paths[1].clone());
    let model = tokio::task::spawn_blocking(move || BertForPreTraining::from_files(&config, &weights))
        .await??;
    Ok(model)
}
