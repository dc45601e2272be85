use std::path::PathBuf;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_DURATION_MINUTES;

/// Configuration stored in ~/.schedly/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// IANA zone used for business-hours checks and day/time resolution.
    #[serde(default = "default_reference_timezone")]
    pub reference_timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_timezone: default_reference_timezone(),
            db_path: None,
            model: ModelConfig::default(),
            default_duration_minutes: default_duration_minutes(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz, String> {
        self.reference_timezone
            .parse::<Tz>()
            .map_err(|_| format!("Unknown reference timezone: {}", self.reference_timezone))
    }
}

fn default_reference_timezone() -> String {
    "UTC".to_string()
}

fn default_duration_minutes() -> i64 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelProvider {
    #[default]
    ClaudeCli,
    Gemini,
}

/// Language-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_model_name")]
    pub model: String,
    /// Environment variable holding the API key (HTTP providers only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model: default_model_name(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    crate::pty::DEFAULT_CLAUDE_TIMEOUT_SECS
}
