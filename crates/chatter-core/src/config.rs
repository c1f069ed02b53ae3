use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ChatterError, Result};

/// Reply used by the simulated assistant when none is configured.
pub const DEFAULT_ASSISTANT_REPLY: &str =
    "I'm your AI assistant. I'm here to help you with any questions or tasks you have.";

/// Top-level configuration for the Chatter application.
///
/// Loaded from `~/.chatter/config.toml` by default. Every section falls back
/// to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl ChatterConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ChatterConfig = toml::from_str(&content)?;
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
        let content =
            toml::to_string_pretty(self).map_err(|e| ChatterError::Config(e.to_string()))?;
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
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Camera and microphone capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// MIME type assigned to finalized voice recordings.
    pub audio_mime_type: String,
    /// Native width reported by the simulated camera.
    pub video_width: u32,
    /// Native height reported by the simulated camera.
    pub video_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            audio_mime_type: "audio/wav".to_string(),
            video_width: 640,
            video_height: 480,
        }
    }
}

/// Simulated assistant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Fixed reply text.
    pub reply: String,
    /// Delay before the reply is produced, in milliseconds.
    pub response_delay_ms: u64,
}

impl AssistantConfig {
    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            reply: DEFAULT_ASSISTANT_REPLY.to_string(),
            response_delay_ms: 1000,
        }
    }
}

/// Notification log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether notifications are recorded in the notification log.
    pub enabled: bool,
    /// Maximum retained notifications; the oldest is evicted first.
    pub max_entries: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 50,
        }
    }
}
