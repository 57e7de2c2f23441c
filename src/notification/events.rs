use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JobCreated,
    JobStarted,
    JobCompleted,
    JobFailed,
    RetryScheduled,
    BatchFinished,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobCreated => "job.created",
            Self::JobStarted => "job.started",
            Self::JobCompleted => "job.completed",
            Self::JobFailed => "job.failed",
            Self::RetryScheduled => "job.retry",
            Self::BatchFinished => "batch.finished",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::JobFailed)
    }
}

/// Lifecycle event. `subject_id` is a job id, or a batch id for batch events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub event_type: EventType,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<(usize, usize)>,
}

impl JobEvent {
    pub fn new(event_type: EventType, subject_id: impl Into<String>) -> Self {
        Self {
            event_type,
            subject_id: subject_id.into(),
            created_at: Utc::now(),
            tag: None,
            message: None,
            progress: None,
        }
    }

    pub fn with_tag(mut self, tag: Option<impl Into<String>>) -> Self {
        self.tag = tag.map(Into::into);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, completed: usize, total: usize) -> Self {
        self.progress = Some((completed, total));
        self
    }

    /// Single-line rendering used by the event log.
    pub fn summary(&self) -> String {
        let mut line = self.event_type.as_str().to_string();
        if let Some(tag) = &self.tag {
            line.push_str(&format!(" [{}]", tag));
        }
        if let Some((completed, total)) = self.progress {
            line.push_str(&format!(" {}/{}", completed, total));
        }
        if let Some(msg) = &self.message {
            line.push_str(": ");
            line.push_str(msg);
        }
        line
    }
}
