//! CLI argument definitions for the CarePath chat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use carepath_core::config::{BackendConfig, CarepathConfig};

/// CarePath: chat with the health assistant and book an appointment.
#[derive(Parser, Debug)]
#[command(name = "carepath", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// User identifier sent with chat requests.
    #[arg(short = 'u', long = "user-id")]
    pub user_id: Option<String>,

    /// Base URL of the backend host, e.g. http://localhost:8080.
    #[arg(short = 'b', long = "backend-url")]
    pub backend_url: Option<String>,

    /// Show replies as soon as they arrive.
    #[arg(long = "no-pacing")]
    pub no_pacing: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long = "write-config")]
    pub write_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CAREPATH_CONFIG env var > ~/.carepath/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CAREPATH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level override. `None` defers to RUST_LOG, then config.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut CarepathConfig) {
        if let Some(ref user_id) = self.user_id {
            config.general.user_id = user_id.clone();
        }
        if let Some(ref host) = self.backend_url {
            config.backend = BackendConfig {
                timeout_secs: config.backend.timeout_secs,
                ..BackendConfig::with_host(host)
            };
        }
        if self.no_pacing {
            config.chat.typing_ms_per_char = 0;
            config.chat.typing_max_ms = 0;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".carepath").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".carepath").join("config.toml");
    }
    PathBuf::from("config.toml")
}
