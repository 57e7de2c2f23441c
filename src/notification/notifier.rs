use std::path::PathBuf;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::JobEvent;
use crate::config::NotificationConfig;

/// Delivers lifecycle events to the per-subject event log and the hook command.
/// Delivery failures are logged and never propagate.
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotificationConfig,
    logs_dir: Option<PathBuf>,
    shell: String,
}

impl Notifier {
    pub fn new(config: NotificationConfig, logs_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            logs_dir,
            shell: "sh".to_string(),
        }
    }

    /// Shell used to run the hook command (`<shell> -c <hook>`).
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn disabled() -> Self {
        Self {
            config: NotificationConfig {
                enabled: false,
                event_log: false,
                hook_command: None,
            },
            logs_dir: None,
            shell: "sh".to_string(),
        }
    }

    pub async fn notify(&self, event: &JobEvent) {
        if !self.config.enabled {
            return;
        }
        if event.event_type.is_error() {
            warn!(subject_id = %event.subject_id, "{}", event.summary());
        } else {
            debug!(subject_id = %event.subject_id, "{}", event.summary());
        }

        if self.config.event_log {
            self.write_event_log(event).await;
        }

        if let Some(hook) = &self.config.hook_command {
            self.run_hook(hook, event).await;
        }
    }

    async fn write_event_log(&self, event: &JobEvent) {
        let Some(logs_dir) = &self.logs_dir else {
            return;
        };

        let log_path = logs_dir.join(format!("{}.log", event.subject_id));
        let log_line = format!(
            "[{}] {}\n",
            event.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            event.summary()
        );

        if let Err(e) = tokio::fs::create_dir_all(logs_dir).await {
            warn!(error = %e, "Failed to create logs directory");
            return;
        }

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await;

        match result {
            Ok(mut file) => {
                if let Err(e) = file.write_all(log_line.as_bytes()).await {
                    warn!(error = %e, "Failed to write event log");
                }
            }
            Err(e) => {
                warn!(error = %e, path = %log_path.display(), "Failed to open event log");
            }
        }
    }

    async fn run_hook(&self, hook_cmd: &str, event: &JobEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(_) => return,
        };

        let result = Command::new(&self.shell)
            .args(["-c", hook_cmd])
            .env("GEOWATCH_EVENT", event.event_type.as_str())
            .env("GEOWATCH_JOB_ID", &event.subject_id)
            .env("GEOWATCH_EVENT_JSON", &json)
            .output()
            .await;

        match result {
            Ok(output) if !output.status.success() => {
                debug!(hook = %hook_cmd, status = %output.status, "Hook exited with failure");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, shell = %self.shell, hook = %hook_cmd, "Failed to run hook"),
        }
    }
}
