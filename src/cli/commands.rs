use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every checkpoint file into the cache
    Fetch,

    /// Show word pieces and ids for a text
    Tokenize(TokenizeArgs),

    /// Show the encoder configuration and the cache manifest
    Info,

    /// Embed texts and print the leading components
    Embed(EmbedArgs),

    /// Rank documents against a query
    Search(SearchArgs),
}

#[derive(Args, Debug)]
pub struct TokenizeArgs {
    /// Text to tokenize
    pub text: String,

    /// Optional second segment, encoded as a pair
    #[arg(long)]
    pub pair: Option<String>,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Texts to embed
    #[arg(required = true)]
    pub texts: Vec<String>,

    /// How many leading components to print per vector
    #[arg(long, default_value_t = 8)]
    pub head: usize,

    /// Save the projection head here after embedding
    #[arg(long)]
    pub save_head: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    #[arg(long, short)]
    pub query: String,

    /// Candidate documents
    #[arg(required = true)]
    pub documents: Vec<String>,

    /// Number of results to show
    #[arg(long, short, default_value_t = 5)]
    pub k: usize,
}
