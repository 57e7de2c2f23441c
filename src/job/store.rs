use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Job, JobStatus, MissionRequest, ResultsPatch, StatusTransition};
use crate::error::{GeowatchError, Result};

const ID_PREFIX: &str = "JOB-";

/// Durable job records, one YAML file per job.
///
/// Reads are served from an in-memory index. Every mutation takes the
/// job's own async lock, persists the new record, then publishes it to the
/// index, so updates to one job never interleave and disjoint jobs never
/// wait on each other.
pub struct JobStore {
    jobs_dir: Option<PathBuf>,
    jobs: RwLock<HashMap<String, Job>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JobStore {
    /// Open (or create) a store rooted at `jobs_dir`, loading every job file.
    pub async fn open(jobs_dir: impl Into<PathBuf>) -> Result<Self> {
        let jobs_dir = jobs_dir.into();
        fs::create_dir_all(&jobs_dir).await?;
        recover_interrupted_writes(&jobs_dir).await;

        let mut jobs = HashMap::new();
        let mut entries = fs::read_dir(&jobs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "yaml") {
                continue;
            }
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable job file");
                    continue;
                }
            };
            match serde_yaml_bw::from_str::<Job>(&content) {
                Ok(job) => {
                    jobs.insert(job.id.clone(), job);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt job file");
                }
            }
        }

        debug!(dir = %jobs_dir.display(), count = jobs.len(), "Job store opened");
        Ok(Self {
            jobs_dir: Some(jobs_dir),
            jobs: RwLock::new(jobs),
            locks: DashMap::new(),
        })
    }

    /// Non-persistent store.
    pub fn in_memory() -> Self {
        Self {
            jobs_dir: None,
            jobs: RwLock::new(HashMap::new()),
            locks: DashMap::new(),
        }
    }

    /// Persist a new job, then make it visible.
    ///
    /// The record is published to the index only after its file is written,
    /// under the job's own lock, so no reader can act on a job that is not
    /// durable yet. A failed write publishes nothing.
    pub async fn create(&self, request: MissionRequest) -> Result<Job> {
        loop {
            let id = new_job_id();
            if self.jobs.read().contains_key(&id) {
                debug!(id = %id, "Job id collision, drawing again");
                continue;
            }

            let lock = self.lock_for(&id);
            let _guard = lock.lock().await;
            // Another create may have taken the id while we waited.
            if self.jobs.read().contains_key(&id) {
                debug!(id = %id, "Job id collision, drawing again");
                continue;
            }

            let job = Job::from_request(id, request);
            self.persist(&job).await?;
            self.jobs.write().insert(job.id.clone(), job.clone());

            debug!(job_id = %job.id, recurrence = %job.recurrence, "Job created");
            return Ok(job);
        }
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.list()
            .into_iter()
            .filter(|j| j.status == status)
            .collect()
    }

    pub fn list_recurring(&self) -> Vec<Job> {
        self.list().into_iter().filter(|j| j.is_recurring()).collect()
    }

    pub fn children_of(&self, parent_id: &str) -> Vec<Job> {
        self.list()
            .into_iter()
            .filter(|j| j.parent_job_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// Transition a job, merging `patch` into its results.
    ///
    /// Returns `Ok(None)` when the id is unknown.
    pub async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        patch: Option<ResultsPatch>,
        error: Option<String>,
    ) -> Result<Option<Job>> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(mut job) = self.get(id) else {
            warn!(job_id = %id, status = %status, "Status update for unknown job ignored");
            return Ok(None);
        };

        if !job.status.can_transition_to(status) {
            return Err(GeowatchError::InvalidStateTransition {
                job_id: id.to_string(),
                from: job.status.to_string(),
                to: status.to_string(),
                allowed: format_allowed(job.status),
            });
        }

        job.status_history
            .push(StatusTransition::new(job.status, status, error.clone()));
        job.status = status;
        if let Some(patch) = patch {
            job.results.apply(patch);
        }
        if let Some(error) = error {
            job.error = Some(error);
        }
        job.updated_at = Utc::now();

        self.persist(&job).await?;
        self.jobs.write().insert(job.id.clone(), job.clone());

        debug!(job_id = %id, status = %status, "Job status updated");
        Ok(Some(job))
    }

    /// Record the latest spawn time of a recurring job.
    pub async fn update_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Job>> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(mut job) = self.get(id) else {
            warn!(job_id = %id, "last_run update for unknown job ignored");
            return Ok(None);
        };
        if !job.is_recurring() {
            warn!(job_id = %id, "last_run update for non-recurring job ignored");
            return Ok(None);
        }

        job.last_run = Some(at);
        job.updated_at = Utc::now();

        self.persist(&job).await?;
        self.jobs.write().insert(job.id.clone(), job.clone());
        Ok(Some(job))
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(id.to_string()).or_default().clone()
    }

    async fn persist(&self, job: &Job) -> Result<()> {
        let Some(dir) = &self.jobs_dir else {
            return Ok(());
        };
        let content = serde_yaml_bw::to_string(job)?;
        write_atomic(&job_path(dir, &job.id), &content).await
    }
}

fn new_job_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", ID_PREFIX, hex[..12].to_ascii_uppercase())
}

fn format_allowed(status: JobStatus) -> String {
    if status.is_terminal() {
        "none".to_string()
    } else {
        status
            .allowed_transitions()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn job_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.yaml", id))
}

async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("yaml.tmp");

    fs::write(&tmp_path, content).await?;

    let sync_path = tmp_path.clone();
    match tokio::task::spawn_blocking(move || {
        std::fs::File::open(&sync_path).and_then(|file| file.sync_all())
    })
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to sync job file to disk"),
        Err(e) => warn!(error = %e, "Sync task failed"),
    }

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

async fn recover_interrupted_writes(dir: &Path) {
    if let Ok(mut entries) = fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                debug!(path = %path.display(), "Removing interrupted write");
                let _ = fs::remove_file(&path).await;
            }
        }
    }
}
