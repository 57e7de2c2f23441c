use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CollaboratorError, GeowatchError, Result};
use crate::job::TimeWindow;

/// Why a supervised mission did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionFailure {
    /// The mission completed but its output was rejected by the quality gate.
    QualityGate(String),
    /// The mission errored. `cause` carries the typed collaborator failure
    /// when there is one.
    Execution {
        message: String,
        cause: Option<CollaboratorError>,
    },
}

impl MissionFailure {
    pub fn from_error(error: &GeowatchError) -> Self {
        Self::Execution {
            message: error.to_string(),
            cause: error.collaborator_cause().cloned(),
        }
    }
}

impl fmt::Display for MissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QualityGate(reason) => write!(f, "quality gate failure: {}", reason),
            Self::Execution { message, .. } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionStrategy {
    ExpandTimeWindow,
    /// Recorded only. The retry still runs under the same concurrency limit.
    ReduceConcurrency,
    /// Unrecoverable without operator action.
    CheckAuth,
    GenericRetry,
}

impl CorrectionStrategy {
    pub fn allows_retry(&self) -> bool {
        !matches!(self, Self::CheckAuth)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpandTimeWindow => "EXPAND_TIME_WINDOW",
            Self::ReduceConcurrency => "REDUCE_CONCURRENCY",
            Self::CheckAuth => "CHECK_AUTH",
            Self::GenericRetry => "GENERIC_RETRY",
        }
    }
}

impl fmt::Display for CorrectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(failure: &MissionFailure) -> CorrectionStrategy {
    match failure {
        MissionFailure::QualityGate(_) => CorrectionStrategy::ExpandTimeWindow,
        MissionFailure::Execution {
            cause: Some(CollaboratorError::Timeout { .. }),
            ..
        } => CorrectionStrategy::ReduceConcurrency,
        MissionFailure::Execution {
            cause: Some(CollaboratorError::Auth(_)),
            ..
        } => CorrectionStrategy::CheckAuth,
        MissionFailure::Execution { .. } => CorrectionStrategy::GenericRetry,
    }
}

/// Search window for the retry, or `None` when the strategy forbids one.
pub fn corrected_window(
    strategy: CorrectionStrategy,
    window: &TimeWindow,
    expansion_factor: u32,
) -> Result<Option<TimeWindow>> {
    Ok(match strategy {
        CorrectionStrategy::CheckAuth => None,
        CorrectionStrategy::ExpandTimeWindow => Some(window.expanded(expansion_factor)?),
        CorrectionStrategy::ReduceConcurrency | CorrectionStrategy::GenericRetry => Some(*window),
    })
}
