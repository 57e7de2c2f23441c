use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::correction::{CorrectionStrategy, MissionFailure, classify, corrected_window};
use super::grid::generate_grid;
use super::quality::{QualityGate, QualityVerdict};
use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::executor::MissionExecutor;
use crate::job::{
    BoundingBox, GeoPoint, JobStore, MissionRequest, TAG_GRID, TAG_GRID_RETRY, TimeWindow,
};
use crate::notification::{EventType, JobEvent, Notifier};

/// Aggregate tally of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub total_missions: usize,
    pub completed_missions: usize,
    /// Grid indices of missions that failed, ascending.
    pub failed_missions: Vec<usize>,
    pub retried_missions: usize,
}

impl BatchReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_missions == 0 {
            return 0.0;
        }
        self.completed_missions as f64 / self.total_missions as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MissionOutcome {
    passed: bool,
    retried: bool,
}

/// Runs grid campaigns: bounded fan-out, quality gate, one corrective retry.
#[derive(Clone)]
pub struct MissionSupervisor {
    executor: Arc<MissionExecutor>,
    gate: QualityGate,
    config: SupervisorConfig,
    notifier: Notifier,
}

impl MissionSupervisor {
    pub fn new(executor: Arc<MissionExecutor>, gate: QualityGate, config: SupervisorConfig) -> Self {
        Self {
            executor,
            gate,
            config,
            notifier: Notifier::disabled(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    fn store(&self) -> &JobStore {
        self.executor.store()
    }

    /// Tile around `center` and run one mission per cell over the default window.
    pub async fn run_grid(&self, center: GeoPoint, count: usize) -> Result<BatchReport> {
        let cells = generate_grid(center, count, self.config.grid_step_degrees)?;
        let window = TimeWindow::last_days(self.config.default_window_days, Utc::now())?;
        Ok(self.run_batch(cells, window).await)
    }

    pub async fn run_batch(&self, cells: Vec<BoundingBox>, window: TimeWindow) -> BatchReport {
        let batch_id = format!("BATCH-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let total = cells.len();
        info!(
            batch_id = %batch_id,
            missions = total,
            concurrency = self.config.max_concurrent_missions,
            window = %window,
            "Batch started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_missions.max(1)));
        let handles: Vec<_> = cells
            .into_iter()
            .enumerate()
            .map(|(index, cell)| {
                let supervisor = self.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return MissionOutcome {
                            passed: false,
                            retried: false,
                        };
                    };
                    supervisor.execute_mission(index, cell, window).await
                })
            })
            .collect();

        let mut report = BatchReport {
            batch_id: batch_id.clone(),
            total_missions: total,
            ..Default::default()
        };
        for (index, result) in join_all(handles).await.into_iter().enumerate() {
            let outcome = result.unwrap_or_else(|e| {
                error!(batch_id = %batch_id, mission = index, error = %e, "Mission task panicked");
                MissionOutcome {
                    passed: false,
                    retried: false,
                }
            });
            if outcome.retried {
                report.retried_missions += 1;
            }
            if outcome.passed {
                report.completed_missions += 1;
            } else {
                report.failed_missions.push(index);
            }
        }
        report.failed_missions.sort_unstable();

        info!(
            batch_id = %batch_id,
            completed = report.completed_missions,
            failed = report.failed_missions.len(),
            retried = report.retried_missions,
            total = report.total_missions,
            "Batch finished"
        );
        self.notifier
            .notify(
                &JobEvent::new(EventType::BatchFinished, &batch_id)
                    .with_progress(report.completed_missions, report.total_missions)
                    .with_message(format!("failed: {:?}", report.failed_missions)),
            )
            .await;

        report
    }

    async fn execute_mission(
        &self,
        index: usize,
        cell: BoundingBox,
        window: TimeWindow,
    ) -> MissionOutcome {
        info!(mission = index, region = %cell, "Mission starting");

        let request = MissionRequest::new(cell, window, self.config.sensor).with_tag(TAG_GRID);
        let (job_id, failure) = self.attempt(request).await;
        let Some(failure) = failure else {
            info!(mission = index, "Mission passed");
            return MissionOutcome {
                passed: true,
                retried: false,
            };
        };

        warn!(mission = index, failure = %failure, "Mission did not pass");
        let passed = self.self_correct(index, cell, window, job_id, &failure).await;
        MissionOutcome {
            passed,
            retried: classify(&failure).allows_retry(),
        }
    }

    /// Create and run one job, then gate its output. Returns the job id (when
    /// one was created) and the failure, if any.
    async fn attempt(&self, request: MissionRequest) -> (Option<String>, Option<MissionFailure>) {
        let job = match self.store().create(request).await {
            Ok(job) => job,
            Err(e) => return (None, Some(MissionFailure::from_error(&e))),
        };

        let failure = match self.executor.run(&job.id).await {
            Ok(artifacts) => match self.gate.evaluate(&artifacts).await {
                QualityVerdict::Pass => None,
                QualityVerdict::Fail(reason) => Some(MissionFailure::QualityGate(reason)),
            },
            Err(e) => Some(MissionFailure::from_error(&e)),
        };
        (Some(job.id), failure)
    }

    async fn self_correct(
        &self,
        index: usize,
        cell: BoundingBox,
        window: TimeWindow,
        original_job: Option<String>,
        failure: &MissionFailure,
    ) -> bool {
        let strategy = classify(failure);
        info!(mission = index, strategy = %strategy, "Self-correction");

        if strategy == CorrectionStrategy::ReduceConcurrency {
            info!(mission = index, "Concurrency reduction is not applied, retrying as is");
        }

        let retry_window =
            match corrected_window(strategy, &window, self.config.window_expansion_factor) {
                Ok(Some(retry_window)) => retry_window,
                Ok(None) => {
                    error!(mission = index, "Credentials rejected, mission cannot be corrected");
                    return false;
                }
                Err(e) => {
                    error!(mission = index, error = %e, "No valid retry window");
                    return false;
                }
            };

        let mut request =
            MissionRequest::new(cell, retry_window, self.config.sensor).with_tag(TAG_GRID_RETRY);
        if let Some(original) = &original_job {
            request = request.with_retry_of(original.clone());
            self.notifier
                .notify(
                    &JobEvent::new(EventType::RetryScheduled, original)
                        .with_message(format!("{} over {}", strategy, retry_window)),
                )
                .await;
        }

        match self.attempt(request).await {
            (_, None) => {
                info!(mission = index, "Self-correction succeeded");
                true
            }
            (_, Some(failure)) => {
                error!(mission = index, failure = %failure, "Self-correction failed");
                false
            }
        }
    }
}
