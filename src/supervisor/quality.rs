use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{ArtifactRef, RasterSampler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityVerdict {
    Pass,
    Fail(String),
}

impl QualityVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail(reason) => Some(reason),
        }
    }
}

/// Output validation for vegetation-index products.
///
/// Without a sampler only the presence of output is checked.
#[derive(Clone, Default)]
pub struct QualityGate {
    sampler: Option<Arc<dyn RasterSampler>>,
}

impl QualityGate {
    pub fn new(sampler: Arc<dyn RasterSampler>) -> Self {
        Self {
            sampler: Some(sampler),
        }
    }

    pub fn without_sampler() -> Self {
        Self { sampler: None }
    }

    pub async fn evaluate(&self, artifacts: &[ArtifactRef]) -> QualityVerdict {
        if artifacts.is_empty() {
            warn!("Quality gate: no artifacts produced");
            return QualityVerdict::Fail("no artifacts produced".into());
        }

        let Some(sampler) = &self.sampler else {
            debug!("Quality gate: no sampler configured, pixel checks skipped");
            return QualityVerdict::Pass;
        };

        for artifact in artifacts.iter().filter(|a| a.kind.is_vegetation_index()) {
            let band = match sampler.first_band(artifact).await {
                Ok(band) => band,
                Err(e) => {
                    warn!(artifact = %artifact.uri, error = %e, "Quality gate: artifact unreadable");
                    return QualityVerdict::Fail(format!("{} unreadable: {}", artifact.uri, e));
                }
            };

            if let Some(problem) = inspect_band(&band) {
                warn!(artifact = %artifact.uri, problem, "Quality gate failed");
                return QualityVerdict::Fail(format!("{} {}", artifact.uri, problem));
            }
            debug!(artifact = %artifact.uri, "Quality gate passed");
        }

        QualityVerdict::Pass
    }
}

/// Describe what is wrong with a band, if anything.
///
/// A band fails when it has no valid (non-NaN) pixels or every valid pixel is
/// zero. A uniform nonzero band passes.
pub fn inspect_band(band: &[f32]) -> Option<&'static str> {
    let mut valid = band.iter().filter(|v| !v.is_nan()).peekable();
    if valid.peek().is_none() {
        return Some("has no valid pixels");
    }
    if valid.all(|v| *v == 0.0) {
        return Some("is all zeros");
    }
    None
}
