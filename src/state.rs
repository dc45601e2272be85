use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::MAX_DURATION_MINUTES;
use crate::llm::build_model;
use crate::orchestrator::Orchestrator;
use crate::services::SchedulingService;
use crate::store::{RecordStore, SqliteStore};
use crate::time_resolver::TimeResolver;
use crate::tools::ToolRegistry;
use crate::types::Config;

/// Everything a front end needs, wired from one config.
pub struct AppState {
    pub config: Config,
    pub service: SchedulingService,
}

impl AppState {
    /// Open the store, build the configured model, and wire the engine.
    pub fn from_config(config: Config) -> Result<Self, String> {
        let tz = config.timezone()?;
        let store: Arc<dyn RecordStore> = Arc::new(
            SqliteStore::open(config.db_path.as_deref())
                .map_err(|e| format!("Failed to open schedule database: {}", e))?,
        );
        let model = build_model(&config.model).map_err(|e| {
            format!("{} ({})", e, e.recovery_suggestion())
        })?;

        let resolver = TimeResolver::new(Arc::clone(&model), tz);
        let registry = Arc::new(ToolRegistry::new(
            Arc::clone(&store),
            resolver,
            config.default_duration_minutes,
        ));
        let orchestrator = Arc::new(Orchestrator::new(registry, model));
        let service = SchedulingService::new(store, orchestrator);

        log::info!(
            "Schedly ready (timezone {}, model {:?})",
            config.reference_timezone,
            config.model.provider
        );
        Ok(Self { config, service })
    }
}

/// Get the canonical config file path (~/.schedly/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".schedly").join("config.json"))
}

/// Load configuration from ~/.schedly/config.json. A missing file means defaults.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    // Fail early on a zone chrono-tz does not know.
    config.timezone()?;
    if !(1..=MAX_DURATION_MINUTES).contains(&config.default_duration_minutes) {
        return Err(format!(
            "defaultDurationMinutes must be between 1 and {}, got {}",
            MAX_DURATION_MINUTES, config.default_duration_minutes
        ));
    }

    Ok(config)
}
