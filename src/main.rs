use std::error::Error;
use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use retrieval::cli::Cli;
use retrieval::Settings;

/// Entry point for the retrieval CLI
///
/// Loads settings, installs file logging and dispatches the parsed
/// subcommand.
///
/// # Errors
/// Returns an error if settings are invalid or the subcommand fails
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Load settings first
    let settings = Settings::new()?;

    let log_path = settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"));
    std::fs::create_dir_all(log_path)?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        log_path,
        "retrieval",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    info!("Retrieval starting up...");
    let full_log_path = std::fs::canonicalize(log_path)?;
    info!("Log directory: {}", full_log_path.display());
    info!("Model: {} @ {} (cache {})",
        settings.model.id, settings.model.revision, settings.model.cache_dir.display());

    let cli = Cli::parse();
    cli.run(&settings).await
}
