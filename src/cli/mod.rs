pub mod commands;
mod display;

use std::error::Error;

use clap::Parser;
use colored::*;
use tracing::info;

use commands::{Commands, EmbedArgs, SearchArgs, TokenizeArgs};
use crate::config::Settings;
use crate::embedder::create_embedder;
use crate::hub::HubClient;
use crate::model::{BertConfig, CONFIG_FILE, WEIGHTS_FILE};
use crate::tokenizer::{create_tokenizer, TOKENIZER_CONFIG_FILE, VOCAB_FILE};
use crate::document_encoder::DocumentEncoder;

/// Command line interface for the retrieval encoder
#[derive(Parser, Debug)]
#[command(name = "retrieval", version, about = "BERT document encoder for retrieval")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(self, settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self.command {
            Commands::Fetch => fetch(settings).await,
            Commands::Tokenize(args) => tokenize(settings, args).await,
            Commands::Info => show_info(settings).await,
            Commands::Embed(args) => embed(settings, args).await,
            Commands::Search(args) => search(settings, args).await,
        }
    }
}

async fn fetch(settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let hub = HubClient::new(&settings.model)?;
    let model_id = &settings.model.id;

    let paths = hub.resolve_all(model_id, &[VOCAB_FILE, CONFIG_FILE, WEIGHTS_FILE]).await?;
    if hub.resolve_optional(model_id, TOKENIZER_CONFIG_FILE).await?.is_none() {
        info!("{} publishes no {}", model_id, TOKENIZER_CONFIG_FILE);
    }
    for path in paths {
        println!("{} {}", "✓".green(), path.display());
    }
    Ok(())
}

async fn tokenize(settings: &Settings, args: TokenizeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let tokenizer = create_tokenizer(settings).await?;
    let encoding = tokenizer.encode_with_options(
        &args.text,
        args.pair.as_deref(),
        Some(settings.encoder.max_sequence_length),
    )?;

    let pieces: Vec<String> = encoding.input_ids.iter()
        .map(|&id| tokenizer.id_to_token(id).unwrap_or("?").to_string())
        .collect();
    display::display_tokens(&pieces, &encoding.input_ids);
    Ok(())
}

async fn show_info(settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    let hub = HubClient::new(&settings.model)?;
    let config = BertConfig::from_file(&hub.resolve(&settings.model.id, CONFIG_FILE).await?)?;
    let head = DocumentEncoder::new(settings.document_encoder.dimensions.clone());

    display::display_config(&settings.model.id, &config, &head);
    display::display_cache(&hub.cache().entries()?);
    Ok(())
}

async fn embed(settings: &Settings, args: EmbedArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let embedder = create_embedder(settings).await?;
    let vectors = embedder.embed(&args.texts)?;
    display::display_embeddings(&args.texts, &vectors, args.head);

    if let Some(path) = &args.save_head {
        embedder.head().save(path)?;
        println!("{} {}", "Saved projection head to".green(), path.display());
    }
    Ok(())
}

async fn search(settings: &Settings, args: SearchArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let embedder = create_embedder(settings).await?;
    let documents: Vec<(String, &str)> = args.documents.iter()
        .enumerate()
        .map(|(i, d)| (i.to_string(), d.as_str()))
        .collect();

    let index = embedder.build_index(&documents)?;
    let results = embedder.search(&index, &args.query, args.k)?;
    display::display_results(&results, &args.documents);
    Ok(())
}
