//! CarePath chat binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML (`--write-config`
//!    saves it and exits)
//! 2. Initialize tracing (stderr, so it does not interleave with the chat)
//! 3. Build the HTTP backend and the handoff slot in the data directory
//! 4. Mount one conversation session and run the terminal surface

mod cli;
mod surface;

use std::sync::Arc;

use clap::Parser;

use carepath_chat::{ChatBackend, ConversationSession, FileHandoff, HttpBackend, SessionSettings};
use carepath_core::config::CarepathConfig;

use crate::cli::CliArgs;
use crate::surface::ChatSurface;

/// Log filter: --log-level flag > RUST_LOG > config file value.
fn init_tracing(flag: Option<String>, config_level: &str) {
    let filter = match flag {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config_level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = CarepathConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    init_tracing(args.resolve_log_level(), &config.general.log_level);

    if args.write_config {
        config.save(&config_file)?;
        println!("Configuration written to {}", config_file.display());
        return Ok(());
    }

    tracing::info!("Starting CarePath v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Handoff slot lives in the data directory.
    let data_dir = config.general.resolved_data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let handoff = FileHandoff::new(&data_dir);

    // Backend.
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(config.backend.clone())?);
    tracing::info!(
        chat = %config.backend.chat_base_url,
        booking = %config.backend.booking_base_url,
        "Backend configured"
    );

    // Session + surface.
    let session = ConversationSession::start(
        Arc::clone(&backend),
        SessionSettings::from_config(&config),
    );
    let mut surface = ChatSurface::new(
        session,
        backend,
        Box::new(handoff),
        config.general.patient_id,
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    surface.run().await?;

    tracing::info!("CarePath stopped");
    Ok(())
}
