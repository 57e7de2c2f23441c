use std::time::Duration;

use thiserror::Error;

/// Closed set of failures a collaborator call can report.
///
/// Failure classification in the supervisor is a pattern match over these
/// variants. Untyped text is only mapped into this set at process boundaries
/// via [`CollaboratorError::from_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{operation} timed out after {duration_secs}s")]
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited (retry after: {retry_after_secs:?})")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("network error: {0}")]
    Network(String),

    #[error("collaborator not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    Failed(String),
}

impl CollaboratorError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_secs: duration.as_secs(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Network(_)
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Map free-form error output (stderr of an external tool) into a typed error.
    /// Only unambiguous markers are recognized; everything else is `Failed`.
    pub fn from_message(msg: &str) -> Self {
        let lower = msg.to_lowercase();

        if lower.contains("429") || lower.contains("too many requests") {
            return Self::RateLimited {
                retry_after_secs: Self::extract_retry_after(&lower),
            };
        }
        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout {
                operation: "collaborator".to_string(),
                duration_secs: 0,
            };
        }
        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("authentication")
            || lower.contains("client_id")
            || lower.contains("invalid credentials")
        {
            return Self::Auth(msg.trim().to_string());
        }
        if lower.contains("502")
            || lower.contains("503")
            || lower.contains("504")
            || lower.contains("connection refused")
            || lower.contains("connection reset")
        {
            return Self::Network(msg.trim().to_string());
        }

        Self::Failed(msg.trim().to_string())
    }

    fn extract_retry_after(lower: &str) -> Option<u64> {
        for pattern in ["retry after ", "retry-after: ", "retry_after="] {
            if let Some(idx) = lower.find(pattern) {
                let digits: String = lower[idx + pattern.len()..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(secs) = digits.parse() {
                    return Some(secs);
                }
            }
        }
        None
    }
}

#[derive(Debug, Error)]
pub enum GeowatchError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid state transition for {job_id}: {from} -> {to} (allowed: {allowed})")]
    InvalidStateTransition {
        job_id: String,
        from: String,
        to: String,
        allowed: String,
    },

    #[error("Job {0} is a recurring definition and cannot be executed directly")]
    RecurringJobNotRunnable(String),

    #[error("no data acquired")]
    NoDataAcquired,

    #[error("no data processed")]
    NoDataProcessed,

    #[error("Acquisition failed: {0}")]
    Acquisition(CollaboratorError),

    #[error("Analysis failed: {0}")]
    Analysis(CollaboratorError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl GeowatchError {
    /// The collaborator failure behind a fatal pipeline step, if any.
    pub fn collaborator_cause(&self) -> Option<&CollaboratorError> {
        match self {
            Self::Acquisition(e) | Self::Analysis(e) | Self::Collaborator(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeowatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message_auth() {
        let err = CollaboratorError::from_message("HTTP 401 Unauthorized: missing client_id");
        assert!(err.is_auth());
    }

    #[test]
    fn test_from_message_timeout() {
        let err = CollaboratorError::from_message("request timed out after 30s");
        assert!(matches!(err, CollaboratorError::Timeout { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_message_rate_limit_retry_after() {
        let err = CollaboratorError::from_message("429 Too Many Requests, Retry-After: 12");
        assert_eq!(
            err,
            CollaboratorError::RateLimited {
                retry_after_secs: Some(12)
            }
        );
    }

    #[test]
    fn test_from_message_unknown_is_failed() {
        let err = CollaboratorError::from_message("  scene index corrupt\n");
        assert_eq!(err, CollaboratorError::Failed("scene index corrupt".into()));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_collaborator_cause() {
        let err = GeowatchError::Acquisition(CollaboratorError::Auth("bad token".into()));
        assert!(err.collaborator_cause().is_some_and(|c| c.is_auth()));
        assert!(GeowatchError::NoDataAcquired.collaborator_cause().is_none());
    }

    #[test]
    fn test_fatal_messages() {
        assert_eq!(GeowatchError::NoDataAcquired.to_string(), "no data acquired");
        assert_eq!(GeowatchError::NoDataProcessed.to_string(), "no data processed");
    }
}
