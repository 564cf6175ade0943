// PetVision proxy - mediates between the app and the Gemini API

pub mod api;
pub mod config;
pub mod error;
pub mod proxy;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting API server...");
    api::start_server(config).await
}
