//! cardlens - identify a trading card from a photo
//!
//! Runs the visual identification pipeline over an image file: crop the name
//! and number bands, OCR them, parse a structured guess and rank catalog
//! candidates against it. Identification is best-effort; when parsing fails
//! the tool reports the manual-entry fallback instead of guessing blindly.

mod capture;
mod catalog;
mod config;
mod parser;
mod session;
mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::catalog::HttpCatalog;
use crate::config::AppConfig;
use crate::session::{RecognitionSession, SessionOutcome};
use crate::vision::RecognitionEngine;

/// Identify a trading card from a photo
#[derive(Parser, Debug)]
#[command(name = "cardlens")]
#[command(about = "Identify a trading card by matching its photo against a remote catalog")]
struct Args {
    /// Path to the card photo (PNG, JPEG, ...)
    image: PathBuf,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the catalog base URL
    #[arg(long)]
    catalog_url: Option<String>,

    /// Override the catalog result limit
    #[arg(long)]
    limit: Option<u32>,

    /// Override the catalog language
    #[arg(long)]
    lang: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = load_or_create_config(args.config.as_deref());
    if let Some(url) = args.catalog_url {
        config.catalog.base_url = url;
    }
    if let Some(limit) = args.limit {
        config.catalog.limit = limit;
    }
    if let Some(lang) = args.lang {
        config.catalog.lang = lang;
    }

    let engine = RecognitionEngine::with_default_backend(
        &config.recognition.language,
        config.recognition.data_path.as_deref(),
    )
    .context("failed to start the recognition engine")?;

    let catalog = Arc::new(HttpCatalog::new(&config.catalog.base_url));
    let session = RecognitionSession::new(
        engine,
        catalog,
        config.catalog.limit,
        config.catalog.lang.clone(),
    );

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let frame = capture::load_from_bytes(&bytes)?;

    session.begin_capture()?;
    let outcome = session.identify(frame).await;
    session.close().await;

    match outcome? {
        SessionOutcome::Identified { result, candidates, .. } => {
            if let Some(guess) = &result.guess {
                println!(
                    "Guess: {} #{}/{} (confidence {}%)",
                    guess.name, guess.card_number, guess.set_total, result.confidence
                );
            }

            if candidates.is_empty() {
                println!("No catalog candidates matched; try manual search.");
            } else {
                println!("Candidates:");
                for (rank, candidate) in candidates.iter().enumerate() {
                    println!(
                        "  {}. [{}] {} #{} - {} ({})",
                        rank + 1,
                        candidate.match_score,
                        candidate.card.name,
                        candidate.card.local_id,
                        candidate.card.set.name,
                        candidate.card.rarity.as_deref().unwrap_or("unknown rarity"),
                    );
                }
            }
        }
        SessionOutcome::ManualFallback { prefill, raw_text } => {
            println!("Could not parse a card identity from the photo.");
            if let Some(name) = prefill {
                println!("Best-effort name prefill: {name}");
            }
            if !raw_text.trim().is_empty() {
                println!("Raw recognized text:\n{raw_text}");
            }
        }
    }

    Ok(())
}

/// Load configuration from the given path, the platform default, or fall
/// back to built-in defaults
fn load_or_create_config(path: Option<&std::path::Path>) -> AppConfig {
    if let Some(path) = path {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                return config;
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}; using defaults", path.display(), e);
                return AppConfig::default();
            }
        }
    }

    if let Some(default_path) = config::default_config_path() {
        if default_path.exists() {
            if let Ok(config) = config::load_config(&default_path) {
                info!("Loaded configuration from {}", default_path.display());
                return config;
            }
        }
    }

    info!("Using default configuration");
    AppConfig::default()
}
