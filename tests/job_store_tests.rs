mod fixtures;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use fixtures::{daily_request, request};
use geowatch::collaborators::{ArtifactRef, IndexKind};
use geowatch::job::{JobStatus, JobStore, ResultsPatch};

#[tokio::test]
async fn test_create_assigns_unique_resolvable_ids() {
    let store = JobStore::in_memory();

    let mut ids = HashSet::new();
    for _ in 0..25 {
        let job = store.create(request()).await.unwrap();
        assert!(ids.insert(job.id.clone()));

        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched.status, JobStatus::Pending);
        assert!(fetched.results.is_empty());
        assert_eq!(fetched.created_at, fetched.updated_at);
    }
    assert_eq!(store.list().len(), 25);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let store = JobStore::in_memory();
    let first = store.create(request()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = store.create(request()).await.unwrap();

    let jobs = store.list();
    assert_eq!(jobs[0].id, second.id);
    assert_eq!(jobs[1].id, first.id);
}

#[tokio::test]
async fn test_lifecycle_records_history() {
    let store = JobStore::in_memory();
    let job = store.create(request()).await.unwrap();

    store
        .update_status(&job.id, JobStatus::Running, None, None)
        .await
        .unwrap();
    let done = store
        .update_status(&job.id, JobStatus::Completed, None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.status_history.len(), 2);
    assert_eq!(done.status_history[0].from, JobStatus::Pending);
    assert_eq!(done.status_history[1].to, JobStatus::Completed);
    assert!(done.updated_at >= done.created_at);
}

#[tokio::test]
async fn test_terminal_states_reject_transitions() {
    let store = JobStore::in_memory();
    let job = store.create(request()).await.unwrap();
    store
        .update_status(&job.id, JobStatus::Running, None, None)
        .await
        .unwrap();
    store
        .update_status(&job.id, JobStatus::Failed, None, Some("boom".into()))
        .await
        .unwrap();

    for target in [JobStatus::Pending, JobStatus::Running, JobStatus::Completed] {
        assert!(store.update_status(&job.id, target, None, None).await.is_err());
    }

    let job = store.get(&job.id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_results_merge_keywise() {
    let store = JobStore::in_memory();
    let job = store.create(request()).await.unwrap();

    store
        .update_status(
            &job.id,
            JobStatus::Running,
            Some(ResultsPatch::new().with_raw(vec![ArtifactRef::raw("raw/S2_a.tif")])),
            None,
        )
        .await
        .unwrap();
    let job = store
        .update_status(
            &job.id,
            JobStatus::Completed,
            Some(ResultsPatch::new().with_processed(vec![ArtifactRef::index(
                "processed/a_NDVI.tif",
                IndexKind::Ndvi,
            )])),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(job.results.raw_artifacts.len(), 1);
    assert_eq!(job.results.processed_artifacts.len(), 1);
}

#[tokio::test]
async fn test_unknown_id_is_noop() {
    let store = JobStore::in_memory();
    let updated = store
        .update_status("JOB-DOESNOTEXIST", JobStatus::Running, None, None)
        .await
        .unwrap();
    assert!(updated.is_none());
    assert!(
        store
            .update_last_run("JOB-DOESNOTEXIST", Utc::now())
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn test_last_run_only_on_recurring_jobs() {
    let store = JobStore::in_memory();
    let plain = store.create(request()).await.unwrap();
    let daily = store.create(daily_request()).await.unwrap();
    let now = Utc::now();

    assert!(store.update_last_run(&plain.id, now).await.unwrap().is_none());
    assert!(store.get(&plain.id).unwrap().last_run.is_none());

    let updated = store.update_last_run(&daily.id, now).await.unwrap().unwrap();
    assert_eq!(updated.last_run, Some(now));
    assert_eq!(updated.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_updates_to_disjoint_jobs() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(JobStore::open(temp.path()).await.unwrap());

    let mut ids = Vec::new();
    for _ in 0..50 {
        ids.push(store.create(request()).await.unwrap().id);
    }

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_status(&id, JobStatus::Running, None, None)
                    .await
                    .unwrap();
                store
                    .update_status(
                        &id,
                        JobStatus::Completed,
                        Some(ResultsPatch::new().with_raw(vec![ArtifactRef::raw(format!(
                            "raw/S2_{}.tif",
                            id
                        ))])),
                        None,
                    )
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    for id in &ids {
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.raw_artifacts.len(), 1);
    }

    let reopened = JobStore::open(temp.path()).await.unwrap();
    assert_eq!(reopened.list_by_status(JobStatus::Completed).len(), 50);
}

#[tokio::test]
async fn test_racing_claims_yield_single_winner() {
    let store = Arc::new(JobStore::in_memory());
    let job = store.create(request()).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let id = job.id.clone();
            tokio::spawn(async move {
                store
                    .update_status(&id, JobStatus::Running, None, None)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.get(&job.id).unwrap().status_history.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_update_racing_create_is_not_lost() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(JobStore::open(temp.path()).await.unwrap());
    let at = Utc::now() - Duration::hours(1);

    let mut updated = Vec::new();
    for _ in 0..40 {
        let watcher = {
            let store = store.clone();
            let known: HashSet<String> = updated.iter().cloned().collect();
            tokio::spawn(async move {
                loop {
                    let fresh = store
                        .list_recurring()
                        .into_iter()
                        .find(|j| !known.contains(&j.id));
                    if let Some(job) = fresh {
                        store.update_last_run(&job.id, at).await.unwrap();
                        return job.id;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };
        let creator = {
            let store = store.clone();
            tokio::spawn(async move { store.create(daily_request()).await.unwrap() })
        };

        let created = creator.await.unwrap();
        let seen = watcher.await.unwrap();
        assert_eq!(seen, created.id);
        assert_eq!(store.get(&seen).unwrap().last_run, Some(at));
        updated.push(seen);
    }

    let reopened = JobStore::open(temp.path()).await.unwrap();
    for id in &updated {
        assert_eq!(reopened.get(id).unwrap().last_run, Some(at));
    }
}

#[tokio::test]
async fn test_reopen_reloads_jobs() {
    let temp = TempDir::new().unwrap();
    let daily_id = {
        let store = JobStore::open(temp.path()).await.unwrap();
        store.create(request()).await.unwrap();
        let daily = store.create(daily_request()).await.unwrap();
        store
            .update_last_run(&daily.id, Utc::now() - Duration::hours(3))
            .await
            .unwrap();
        daily.id
    };

    let store = JobStore::open(temp.path()).await.unwrap();
    assert_eq!(store.list().len(), 2);
    let daily = store.get(&daily_id).unwrap();
    assert!(daily.last_run.is_some());
    assert_eq!(store.list_recurring().len(), 1);
}

#[tokio::test]
async fn test_children_of_parent() {
    let store = JobStore::in_memory();
    let parent = store.create(daily_request()).await.unwrap();
    store
        .create(request().with_parent(parent.id.clone()))
        .await
        .unwrap();
    store
        .create(request().with_parent(parent.id.clone()))
        .await
        .unwrap();
    store.create(request()).await.unwrap();

    let children = store.children_of(&parent.id);
    assert_eq!(children.len(), 2);
    assert!(
        children
            .iter()
            .all(|c| c.parent_job_id.as_deref() == Some(parent.id.as_str()))
    );
}
