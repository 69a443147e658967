//! Main Entrypoint for the Kiosk Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the session and its headless collaborators.
//! 4. Running the dispatch loop until Ctrl+C, then draining playback and closing the connection.

use anyhow::Context;
use kiosk_service::{config::Config, runtime::Kiosk};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to shut the kiosk down gracefully.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C; shutting down.");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Building session...");

    // --- 3. Build the Kiosk ---
    let kiosk = Kiosk::new(&config);

    // --- 4. Run ---
    info!(
        ws_url = %config.ws_url,
        base_url = %config.base_url,
        auto_start_mic = config.auto_start_mic_on_conversation_end,
        "Kiosk configured. Connecting to backend..."
    );
    kiosk
        .run(&config.ws_url, shutdown_signal())
        .await
        .context("Kiosk session failed")?;

    info!("Kiosk has shut down.");
    Ok(())
}
