use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn allowed_transitions(&self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            // Pending -> Failed covers a job that cannot be claimed at all.
            Pending => &[Running, Failed],
            Running => &[Completed, Failed],
            Completed => &[],
            Failed => &[],
        }
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusTransition {
    pub fn new(from: JobStatus, to: JobStatus, reason: Option<String>) -> Self {
        Self {
            from,
            to,
            reason,
            at: Utc::now(),
        }
    }
}
