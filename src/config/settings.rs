use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{GeowatchError, Result};
use crate::job::Sensor;
use crate::supervisor::MAX_GRID_CELLS;

pub const CONFIG_FILE_NAME: &str = "config.toml";

const MAX_WINDOW_DAYS: u32 = 3650;
const MAX_EXPANSION_FACTOR: u32 = 16;

/// Top-level configuration, constructed once and handed to every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeowatchConfig {
    pub executor: ExecutorConfig,
    pub scheduler: SchedulerConfig,
    pub supervisor: SupervisorConfig,
    pub notification: NotificationConfig,
    pub collaborators: CollaboratorCommands,
}

impl GeowatchConfig {
    /// Load `config.toml` from the data directory, falling back to defaults.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        Self::load_file(&data_dir.join(CONFIG_FILE_NAME)).await
    }

    pub async fn load_file(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(data_dir).await?;
        let content = self.to_toml()?;
        fs::write(data_dir.join(CONFIG_FILE_NAME), content).await?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeowatchError::Config(e.to_string()))
    }

    /// Validate configuration values, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        // Scheduler
        if self.scheduler.poll_interval_secs == 0 {
            errors.push("scheduler.poll_interval_secs must be greater than 0");
        }
        if self.scheduler.max_concurrent_runs == 0 {
            errors.push("scheduler.max_concurrent_runs must be greater than 0");
        }

        // Supervisor
        let sv = &self.supervisor;
        if sv.max_concurrent_missions == 0 {
            errors.push("supervisor.max_concurrent_missions must be greater than 0");
        }
        if !(sv.grid_step_degrees > 0.0 && sv.grid_step_degrees <= 10.0) {
            errors.push("supervisor.grid_step_degrees must be in (0, 10]");
        }
        if sv.default_window_days == 0 || sv.default_window_days > MAX_WINDOW_DAYS {
            errors.push("supervisor.default_window_days must be in [1, 3650]");
        }
        if sv.window_expansion_factor < 2 || sv.window_expansion_factor > MAX_EXPANSION_FACTOR {
            errors.push("supervisor.window_expansion_factor must be in [2, 16] (retry window must widen)");
        }
        if sv.default_count > MAX_GRID_CELLS {
            errors.push("supervisor.default_count must be at most 10000");
        }

        // Notification
        if let Some(hook) = &self.notification.hook_command
            && hook.trim().is_empty()
        {
            errors.push("notification.hook_command must not be blank when set");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GeowatchError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound for a single collaborator call (0 = unlimited).
    pub call_timeout_secs: u64,
    pub change_detection: bool,
    pub catalog_registration: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 900,
            change_detection: true,
            catalog_registration: true,
        }
    }
}

impl ExecutorConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    /// Worker pool size for dispatched recurring runs.
    pub max_concurrent_runs: usize,
    /// Skip a due parent while one of its children is still running.
    pub serialize_per_parent: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            max_concurrent_runs: 4,
            serialize_per_parent: true,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub max_concurrent_missions: usize,
    pub grid_step_degrees: f64,
    pub default_count: usize,
    pub default_window_days: u32,
    /// Multiplier applied to the search window on an `ExpandTimeWindow` retry.
    pub window_expansion_factor: u32,
    pub sensor: Sensor,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_missions: 5,
            grid_step_degrees: 0.01,
            default_count: 100,
            default_window_days: 30,
            window_expansion_factor: 2,
            sensor: Sensor::Optical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub event_log: bool,
    pub hook_command: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            event_log: true,
            hook_command: None,
        }
    }
}

/// Shell commands bound to each collaborator. Unset commands leave the
/// collaborator unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorCommands {
    pub shell: String,
    pub acquire: Option<String>,
    pub context: Option<String>,
    pub analyze: Option<String>,
    pub delta: Option<String>,
    pub catalog: Option<String>,
    pub report: Option<String>,
    pub sample: Option<String>,
}

impl Default for CollaboratorCommands {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            acquire: None,
            context: None,
            analyze: None,
            delta: None,
            catalog: None,
            report: None,
            sample: None,
        }
    }
}

/// Filesystem layout under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            jobs_dir: data_dir.join("jobs"),
            logs_dir: data_dir.join("logs"),
            data_dir,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.jobs_dir, &self.logs_dir] {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
