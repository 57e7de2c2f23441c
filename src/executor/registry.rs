use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::MissionExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Wait for every in-flight execution to finish.
    Drain,
    /// Leave in-flight executions running unobserved.
    Detach,
}

/// Bounded worker pool for executions dispatched in the background.
///
/// Each dispatch is keyed (the recurring parent id for scheduler runs) so a
/// caller can ask whether work for that key is still in flight.
pub struct TaskRegistry {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    in_flight: Arc<DashMap<String, String>>,
}

impl TaskRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Run `job_id` through the executor on a worker task.
    pub fn dispatch(&self, key: impl Into<String>, executor: Arc<MissionExecutor>, job_id: String) {
        let key = key.into();
        self.in_flight.insert(key.clone(), job_id.clone());

        let permits = self.permits.clone();
        let guard = InFlightGuard {
            key,
            in_flight: self.in_flight.clone(),
        };

        let mut tasks = self.tasks.lock();
        reap_finished(&mut tasks);
        tasks.spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(job_id = %job_id, "Worker pool closed, execution dropped");
                return;
            };
            match executor.run(&job_id).await {
                Ok(artifacts) => {
                    debug!(job_id = %job_id, artifacts = artifacts.len(), "Dispatched run finished")
                }
                Err(e) => debug!(job_id = %job_id, error = %e, "Dispatched run failed"),
            }
        });
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn shutdown(&self, mode: ShutdownMode) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        match mode {
            ShutdownMode::Drain => {
                info!(count = tasks.len(), "Draining in-flight executions");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        warn!(error = %e, "Dispatched execution panicked");
                    }
                }
            }
            ShutdownMode::Detach => {
                info!(count = tasks.len(), "Detaching in-flight executions");
                tasks.detach_all();
            }
        }
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        // Dropping a JoinSet aborts its tasks; dispatched runs are never cancelled.
        self.tasks.get_mut().detach_all();
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result
            && e.is_panic()
        {
            warn!(error = %e, "Dispatched execution panicked");
        }
    }
}

struct InFlightGuard {
    key: String,
    in_flight: Arc<DashMap<String, String>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
