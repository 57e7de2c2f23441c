use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collaborators::{ArtifactRef, CatalogEntry, CollaboratorResult, Collaborators};
use crate::config::ExecutorConfig;
use crate::error::{CollaboratorError, GeowatchError, Result};
use crate::job::{Job, JobStatus, JobStore, ResultsPatch};
use crate::notification::{EventType, JobEvent, Notifier};

/// Runs the single-job pipeline and records every transition in the store.
///
/// acquire -> context (best-effort) -> analyze -> change detection (children
/// only) -> catalog (best-effort) -> report (best-effort).
pub struct MissionExecutor {
    store: Arc<JobStore>,
    collaborators: Collaborators,
    config: ExecutorConfig,
    notifier: Notifier,
}

impl MissionExecutor {
    pub fn new(store: Arc<JobStore>, collaborators: Collaborators, config: ExecutorConfig) -> Self {
        Self {
            store,
            collaborators,
            config,
            notifier: Notifier::disabled(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Execute a pending job to a terminal state.
    ///
    /// Returns the processed artifacts on success. Fatal pipeline errors are
    /// recorded on the job as `FAILED` and returned.
    pub async fn run(&self, job_id: &str) -> Result<Vec<ArtifactRef>> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| GeowatchError::JobNotFound(job_id.to_string()))?;

        if job.is_recurring() {
            return Err(GeowatchError::RecurringJobNotRunnable(job_id.to_string()));
        }

        self.store
            .update_status(job_id, JobStatus::Running, None, None)
            .await?
            .ok_or_else(|| GeowatchError::JobNotFound(job_id.to_string()))?;

        info!(job_id = %job_id, region = %job.region, window = %job.time_window, sensor = %job.sensor, "Mission started");
        self.notifier
            .notify(&JobEvent::new(EventType::JobStarted, job_id).with_tag(job.tag.clone()))
            .await;

        let mut staged = ResultsPatch::new();
        let outcome = match self.execute(&job, &mut staged).await {
            Ok(processed) => self
                .store
                .update_status(job_id, JobStatus::Completed, Some(staged.clone()), None)
                .await
                .map(|_| processed),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(processed) => {
                info!(job_id = %job_id, artifacts = processed.len(), "Mission completed");
                self.notifier
                    .notify(
                        &JobEvent::new(EventType::JobCompleted, job_id)
                            .with_tag(job.tag.clone())
                            .with_message(format!("{} processed artifacts", processed.len())),
                    )
                    .await;
                Ok(processed)
            }
            Err(e) => {
                self.mark_failed(&job, staged, &e).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &Job, staged: &mut ResultsPatch) -> Result<Vec<ArtifactRef>> {
        let collab = &self.collaborators;

        let raw = self
            .bounded(
                "acquire",
                collab
                    .acquirer
                    .acquire(&job.region, &job.time_window, job.sensor),
            )
            .await
            .map_err(GeowatchError::Acquisition)?;
        if raw.is_empty() {
            return Err(GeowatchError::NoDataAcquired);
        }
        debug!(job_id = %job.id, count = raw.len(), "Acquired raw artifacts");
        staged.raw_artifacts = Some(raw.clone());

        let context = match &collab.context {
            Some(provider) => match self
                .bounded("context", provider.fetch(&job.region, &job.time_window))
                .await
            {
                Ok(context) => context,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Context enrichment failed, continuing");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        staged.context_artifacts = Some(context.clone());

        let mut processed = self
            .bounded("analyze", collab.analyzer.analyze(&raw))
            .await
            .map_err(GeowatchError::Analysis)?;
        if processed.is_empty() {
            return Err(GeowatchError::NoDataProcessed);
        }
        debug!(job_id = %job.id, count = processed.len(), "Analysis produced artifacts");

        if self.config.change_detection && job.parent_job_id.is_some() {
            let deltas = self.detect_changes(job, &processed).await;
            processed.extend(deltas);
        }
        staged.processed_artifacts = Some(processed.clone());

        if self.config.catalog_registration {
            self.register_in_catalog(job, &processed).await;
        }

        let mut report_inputs = processed.clone();
        report_inputs.extend(context);
        match self
            .bounded("report", collab.reporter.report(&job.id, &report_inputs))
            .await
        {
            Ok(report) => staged.report_ref = Some(report),
            Err(e) => warn!(job_id = %job.id, error = %e, "Report generation failed, continuing"),
        }

        Ok(processed)
    }

    /// Compare each index product against the same index of the most recent
    /// completed sibling. Failures only skip the delta.
    async fn detect_changes(&self, job: &Job, processed: &[ArtifactRef]) -> Vec<ArtifactRef> {
        let (Some(detector), Some(parent_id)) =
            (&self.collaborators.change_detector, &job.parent_job_id)
        else {
            return Vec::new();
        };

        // Newest first.
        let siblings: Vec<Job> = self
            .store
            .children_of(parent_id)
            .into_iter()
            .filter(|s| s.id != job.id && s.status == JobStatus::Completed)
            .collect();

        let mut deltas = Vec::new();
        for current in processed {
            let Some(index) = current.kind.index() else {
                continue;
            };
            let prior = siblings.iter().find_map(|s| {
                s.results
                    .processed_artifacts
                    .iter()
                    .find(|a| a.kind.index() == Some(index))
            });
            let Some(prior) = prior else {
                debug!(job_id = %job.id, index = %index, "No prior run to compare against");
                continue;
            };

            match self
                .bounded("delta", detector.compute_delta(current, prior))
                .await
            {
                Ok(Some(delta)) => {
                    debug!(job_id = %job.id, delta = %delta.uri, "Change detection produced delta");
                    deltas.push(delta);
                }
                Ok(None) => debug!(job_id = %job.id, index = %index, "No delta produced"),
                Err(e) => debug!(job_id = %job.id, error = %e, "Change detection skipped"),
            }
        }
        deltas
    }

    async fn register_in_catalog(&self, job: &Job, processed: &[ArtifactRef]) {
        let Some(catalog) = &self.collaborators.catalog else {
            return;
        };

        for artifact in processed {
            let mut entry = CatalogEntry::new(
                &job.id,
                artifact.clone(),
                job.region,
                job.time_window.end,
            )
            .with_property("job_id", job.id.as_str())
            .with_property("sensor", job.sensor.as_str())
            .with_property("kind", artifact.kind.to_string());
            if let Some(parent) = &job.parent_job_id {
                entry = entry.with_property("parent_job_id", parent.as_str());
            }

            if let Err(e) = self.bounded("catalog", catalog.register(&entry)).await {
                warn!(job_id = %job.id, item_id = %entry.item_id, error = %e, "Catalog registration failed");
            }
        }
    }

    async fn mark_failed(&self, job: &Job, staged: ResultsPatch, error: &GeowatchError) {
        let message = error.to_string();
        warn!(job_id = %job.id, error = %message, "Mission failed");

        if let Err(e) = self
            .store
            .update_status(&job.id, JobStatus::Failed, Some(staged), Some(message.clone()))
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to record mission failure");
        }

        self.notifier
            .notify(
                &JobEvent::new(EventType::JobFailed, &job.id)
                    .with_tag(job.tag.clone())
                    .with_message(message),
            )
            .await;
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> CollaboratorResult<T>
    where
        F: Future<Output = CollaboratorResult<T>>,
    {
        match self.config.call_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(CollaboratorError::timeout(operation, limit))),
            None => call.await,
        }
    }
}
