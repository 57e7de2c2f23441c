use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::executor::{MissionExecutor, TaskRegistry};
use crate::job::{Job, JobStore, MissionRequest, Recurrence, TAG_DAILY_RUN, TimeWindow};
use crate::notification::{EventType, JobEvent, Notifier};

/// Whether a daily definition should spawn again at `now`.
pub fn is_due(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_due_after(last_run, now, Duration::hours(24))
}

fn is_due_after(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>, period: Duration) -> bool {
    match last_run {
        None => true,
        Some(last) => now - last >= period,
    }
}

/// Outcome of one scheduler poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// `(parent_id, child_id)` pairs spawned this cycle.
    pub spawned: Vec<(String, String)>,
    /// Due parents held back because a previous child is still running.
    pub deferred: Vec<String>,
}

/// Polls the store for recurring definitions and spawns their children.
pub struct RecurringScheduler {
    executor: Arc<MissionExecutor>,
    registry: Arc<TaskRegistry>,
    config: SchedulerConfig,
    notifier: Notifier,
}

impl RecurringScheduler {
    pub fn new(executor: Arc<MissionExecutor>, config: SchedulerConfig) -> Self {
        let registry = Arc::new(TaskRegistry::new(config.max_concurrent_runs));
        Self {
            executor,
            registry,
            config,
            notifier: Notifier::disabled(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    fn store(&self) -> &JobStore {
        self.executor.store()
    }

    /// Spawn a child for every due recurring definition.
    ///
    /// A failure for one parent is logged and the cycle moves on to the next.
    pub async fn check_jobs(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        for parent in self.store().list_recurring() {
            let Some(period) = parent.recurrence.period() else {
                continue;
            };
            if !is_due_after(parent.last_run, now, period) {
                continue;
            }

            if self.config.serialize_per_parent && self.registry.is_in_flight(&parent.id) {
                info!(parent_id = %parent.id, "Previous run still in flight, deferring");
                report.deferred.push(parent.id.clone());
                continue;
            }

            let child = match self.spawn_child(&parent, now, period).await {
                Ok(child) => child,
                Err(e) => {
                    warn!(parent_id = %parent.id, error = %e, "Failed to create child job");
                    continue;
                }
            };

            self.registry
                .dispatch(parent.id.clone(), self.executor.clone(), child.id.clone());
            if let Err(e) = self.store().update_last_run(&parent.id, now).await {
                warn!(parent_id = %parent.id, error = %e, "Failed to record last run");
            }

            info!(parent_id = %parent.id, child_id = %child.id, "Recurring run dispatched");
            report.spawned.push((parent.id, child.id));
        }

        debug!(
            spawned = report.spawned.len(),
            deferred = report.deferred.len(),
            "Scheduler cycle finished"
        );
        report
    }

    async fn spawn_child(&self, parent: &Job, now: DateTime<Utc>, period: Duration) -> Result<Job> {
        let request = MissionRequest::new(
            parent.region,
            TimeWindow::ending_at(now, period)?,
            parent.sensor,
        )
        .with_recurrence(Recurrence::None)
        .with_parent(parent.id.clone())
        .with_tag(TAG_DAILY_RUN);

        let child = self.store().create(request).await?;
        self.notifier
            .notify(
                &JobEvent::new(EventType::JobCreated, &child.id)
                    .with_tag(child.tag.clone())
                    .with_message(format!("spawned by {}", parent.id)),
            )
            .await;
        Ok(child)
    }

    /// Poll until `stop` flips to `true`. Dispatched runs are left to the
    /// registry; the caller decides whether to drain or detach them.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.poll_interval_secs,
            "Recurring scheduler started"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            self.check_jobs(Utc::now()).await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!(in_flight = self.registry.in_flight_count(), "Recurring scheduler stopped");
    }
}
