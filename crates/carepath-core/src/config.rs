use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the Carepath assistant.
///
/// Loaded from `~/.carepath/config.toml` by default. Every section falls back
/// to its defaults when absent, so a partial file is always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarepathConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl CarepathConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CarepathConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// User identifier sent with every backend request.
    pub user_id: String,
    /// Patient record the appointments service books against.
    pub patient_id: i64,
    /// Directory for the handoff slot file.
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            user_id: "user123".to_string(),
            patient_id: 1,
            data_dir: "~/.carepath".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Expand a leading `~` in `data_dir` to the user's home directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        let dir = self.data_dir.as_str();
        if let Some(rest) = dir.strip_prefix("~/").or_else(|| dir.strip_prefix("~\\")) {
            home_dir().join(rest)
        } else if dir == "~" {
            home_dir()
        } else {
            PathBuf::from(dir)
        }
    }
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
}

/// Locations of the AI and booking services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the AI agent endpoints (`/health`, `/chat`).
    pub chat_base_url: String,
    /// Base URL of the conversational booking endpoints
    /// (`/conversation`, `/clarification`).
    pub booking_base_url: String,
    /// Base URL of the appointment endpoints (`/book`).
    pub appointments_base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            chat_base_url: "http://localhost:8080/api/ai".to_string(),
            booking_base_url: "http://localhost:8080/api/booking".to_string(),
            appointments_base_url: "http://localhost:8080/api/appointments".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Point every service at a single host, keeping the standard paths.
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            chat_base_url: format!("{}/api/ai", host),
            booking_base_url: format!("{}/api/booking", host),
            appointments_base_url: format!("{}/api/appointments", host),
            ..Self::default()
        }
    }
}

/// Chat surface and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
    /// Typing indicator time per character of user input.
    pub typing_ms_per_char: u64,
    /// Ceiling for the typing indicator.
    pub typing_max_ms: u64,
    /// How far ahead the date picker allows booking.
    pub booking_window_days: i64,
    /// Quick-pick day offsets offered by the date picker.
    pub quick_date_offsets: Vec<i64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 500,
            typing_ms_per_char: 50,
            typing_max_ms: 2000,
            booking_window_days: 90,
            quick_date_offsets: vec![1, 2, 7],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CarepathError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = CarepathConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.user_id, "user123");
        assert_eq!(config.general.patient_id, 1);
        assert_eq!(config.backend.chat_base_url, "http://localhost:8080/api/ai");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.chat.max_message_length, 500);
        assert_eq!(config.chat.typing_ms_per_char, 50);
        assert_eq!(config.chat.typing_max_ms, 2000);
        assert_eq!(config.chat.booking_window_days, 90);
        assert_eq!(config.chat.quick_date_offsets, vec![1, 2, 7]);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
user_id = "patient-7"
patient_id = 42

[backend]
chat_base_url = "http://ai.internal/api/ai"
timeout_secs = 5

[chat]
typing_max_ms = 500
quick_date_offsets = [1, 3]
"#;
        let file = create_temp_config(content);
        let config = CarepathConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.user_id, "patient-7");
        assert_eq!(config.general.patient_id, 42);
        assert_eq!(config.backend.chat_base_url, "http://ai.internal/api/ai");
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.chat.typing_max_ms, 500);
        assert_eq!(config.chat.quick_date_offsets, vec![1, 3]);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = CarepathConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.user_id, "user123");
        assert_eq!(
            config.backend.booking_base_url,
            "http://localhost:8080/api/booking"
        );
        assert_eq!(config.chat.max_message_length, 500);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nlog_level = ");
        let err = CarepathConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CarepathError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = CarepathConfig::load_or_default(Path::new("/nonexistent/carepath.toml"));
        assert_eq!(config.general.user_id, "user123");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CarepathConfig::default();
        config.general.user_id = "saved-user".to_string();
        config.save(&path).unwrap();

        let reloaded = CarepathConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.user_id, "saved-user");
        assert_eq!(reloaded.chat.typing_max_ms, config.chat.typing_max_ms);
    }

    #[test]
    fn test_backend_with_host() {
        let backend = BackendConfig::with_host("http://10.0.0.2:9000/");
        assert_eq!(backend.chat_base_url, "http://10.0.0.2:9000/api/ai");
        assert_eq!(backend.booking_base_url, "http://10.0.0.2:9000/api/booking");
        assert_eq!(
            backend.appointments_base_url,
            "http://10.0.0.2:9000/api/appointments"
        );
        assert_eq!(backend.timeout_secs, 30);
    }

    #[test]
    fn test_resolved_data_dir_absolute_untouched() {
        let general = GeneralConfig {
            data_dir: "/var/lib/carepath".to_string(),
            ..GeneralConfig::default()
        };
        assert_eq!(general.resolved_data_dir(), PathBuf::from("/var/lib/carepath"));
    }

    #[test]
    fn test_resolved_data_dir_expands_home() {
        let general = GeneralConfig::default();
        let resolved = general.resolved_data_dir();
        assert!(resolved.ends_with(".carepath"));
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }
}
