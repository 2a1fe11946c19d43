//! Record bookkeeping: persist and query Jobs and TaskGroups.
//!
//! Everything here goes through the `RecordStore` port, so the behavior is
//! identical across store implementations. In particular the phase filter of
//! `list_task_groups` is a pure client-side predicate; no store-side query
//! semantics are assumed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{JobRecord, JobState, StoreError, TaskGroupRecord};
use crate::ports::RecordStore;

/// Logical collection holding one record per job.
pub const JOBS_BUCKET: &str = "jobs";

/// Logical collection holding one record per task group.
pub const TASK_GROUPS_BUCKET: &str = "task_groups";

fn encode<T: Serialize>(bucket: &str, record: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|source| StoreError::Codec {
        bucket: bucket.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(bucket: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Codec {
        bucket: bucket.to_string(),
        source,
    })
}

/// Write a job record through the adapter.
pub async fn put_job(store: &dyn RecordStore, job: &JobRecord) -> Result<(), StoreError> {
    let value = encode(JOBS_BUCKET, job)?;
    store.upsert(JOBS_BUCKET, &job.job_id, value).await
}

/// Fetch a job record, `None` if the store has no visible record for it.
pub async fn get_job(store: &dyn RecordStore, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
    let records = store.list(JOBS_BUCKET, job_id).await?;
    records
        .into_iter()
        .next()
        .map(|value| decode(JOBS_BUCKET, value))
        .transpose()
}

/// Write a task group record through the adapter.
pub async fn put_task_group(
    store: &dyn RecordStore,
    group: &TaskGroupRecord,
) -> Result<(), StoreError> {
    let value = encode(TASK_GROUPS_BUCKET, group)?;
    store
        .upsert(TASK_GROUPS_BUCKET, &group.task_group_id, value)
        .await
}

/// List all task groups of a job, optionally narrowed to one phase.
pub async fn list_task_groups(
    store: &dyn RecordStore,
    job_id: &str,
    phase_num: Option<u32>,
) -> Result<Vec<TaskGroupRecord>, StoreError> {
    let mut groups = store
        .list(TASK_GROUPS_BUCKET, job_id)
        .await?
        .into_iter()
        .map(|value| decode::<TaskGroupRecord>(TASK_GROUPS_BUCKET, value))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(phase_num) = phase_num {
        groups.retain(|g| g.phase_num == phase_num);
    }

    Ok(groups)
}

/// True iff phase `phase_num` of the job has at least one task group and
/// every group's results exactly cover its owned key set.
///
/// An empty group set is not complete: it usually means the phase has not
/// been partitioned yet (or the store has not caught up with the writes).
/// The answer reflects the store's current view, so callers watching an
/// eventually-consistent store re-evaluate it through the poller instead of
/// caching it.
pub async fn is_phase_complete(
    store: &dyn RecordStore,
    job_id: &str,
    phase_num: u32,
) -> Result<bool, StoreError> {
    let groups = list_task_groups(store, job_id, Some(phase_num)).await?;
    let complete = !groups.is_empty() && groups.iter().all(TaskGroupRecord::is_fully_resolved);
    debug!(job_id, phase_num, groups = groups.len(), complete, "phase completeness check");
    Ok(complete)
}

/// True iff the job record is visible and in its terminal `done` state.
pub async fn is_job_complete(store: &dyn RecordStore, job_id: &str) -> Result<bool, StoreError> {
    let job = get_job(store, job_id).await?;
    Ok(job.is_some_and(|j| j.state == JobState::Done))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KeyOutcome, PhaseSpec, ResultRecord};
    use crate::impls::InMemoryStore;
    use chrono::Utc;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    fn job_fixture(job_id: &str) -> JobRecord {
        JobRecord::new(
            job_id,
            format!("{job_id} fixture"),
            vec![PhaseSpec::new("echo")],
            keys(&["key1", "key2", "key3", "key4"]),
            Utc::now(),
        )
        .unwrap()
    }

    fn resolve(group: &mut TaskGroupRecord) {
        let done = Utc::now();
        group.results = group
            .input_keys
            .iter()
            .map(|key| {
                ResultRecord::new(
                    "worker-000",
                    key,
                    KeyOutcome::Ok,
                    vec![format!("{key}{}", group.phase_num)],
                    vec![],
                    vec![],
                    done - chrono::Duration::milliseconds(1),
                    done,
                )
                .unwrap()
            })
            .collect();
    }

    #[tokio::test]
    async fn job_roundtrips_through_the_store() {
        let store = InMemoryStore::new();
        let job = job_fixture("job-001");
        put_job(&store, &job).await.unwrap();

        let back = get_job(&store, "job-001").await.unwrap().unwrap();
        assert_eq!(back.job_id, "job-001");
        assert_eq!(back.state, JobState::Queued);
        assert_eq!(back.input_keys, job.input_keys);
    }

    #[tokio::test]
    async fn get_job_returns_none_for_unknown_id() {
        let store = InMemoryStore::new();
        assert!(get_job(&store, "job-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_task_groups_filters_by_phase_client_side() {
        let store = InMemoryStore::new();
        let g0 = TaskGroupRecord::new("tg-000", "job-001", 0, keys(&["key1", "key2"])).unwrap();
        let g1 = TaskGroupRecord::new("tg-001", "job-001", 1, keys(&["key1", "key2"])).unwrap();
        put_task_group(&store, &g0).await.unwrap();
        put_task_group(&store, &g1).await.unwrap();

        let all = list_task_groups(&store, "job-001", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let phase1 = list_task_groups(&store, "job-001", Some(1)).await.unwrap();
        assert_eq!(phase1.len(), 1);
        assert_eq!(phase1[0].task_group_id, "tg-001");

        let phase9 = list_task_groups(&store, "job-001", Some(9)).await.unwrap();
        assert!(phase9.is_empty());
    }

    #[tokio::test]
    async fn list_task_groups_is_scoped_to_one_job() {
        let store = InMemoryStore::new();
        let mine = TaskGroupRecord::new("tg-000", "job-001", 0, keys(&["key1"])).unwrap();
        let other = TaskGroupRecord::new("tg-100", "job-002", 0, keys(&["key1"])).unwrap();
        put_task_group(&store, &mine).await.unwrap();
        put_task_group(&store, &other).await.unwrap();

        let groups = list_task_groups(&store, "job-001", None).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].task_group_id, "tg-000");
    }

    #[tokio::test]
    async fn phase_with_no_task_groups_is_not_complete() {
        let store = InMemoryStore::new();
        assert!(!is_phase_complete(&store, "job-001", 0).await.unwrap());
    }

    #[tokio::test]
    async fn phase_with_a_partial_group_is_not_complete() {
        let store = InMemoryStore::new();
        let mut full = TaskGroupRecord::new("tg-000", "job-001", 0, keys(&["key1", "key2"])).unwrap();
        resolve(&mut full);
        let bare = TaskGroupRecord::new("tg-001", "job-001", 0, keys(&["key3", "key4"])).unwrap();
        put_task_group(&store, &full).await.unwrap();
        put_task_group(&store, &bare).await.unwrap();

        assert!(!is_phase_complete(&store, "job-001", 0).await.unwrap());
    }

    #[tokio::test]
    async fn phase_with_full_coverage_is_complete_and_stays_complete() {
        let store = InMemoryStore::new();
        for (id, owned) in [("tg-000", ["key1", "key2"]), ("tg-001", ["key3", "key4"])] {
            let mut group = TaskGroupRecord::new(id, "job-001", 0, keys(&owned)).unwrap();
            resolve(&mut group);
            put_task_group(&store, &group).await.unwrap();
        }

        assert!(is_phase_complete(&store, "job-001", 0).await.unwrap());
        // idempotent re-check
        assert!(is_phase_complete(&store, "job-001", 0).await.unwrap());
    }

    #[tokio::test]
    async fn job_is_complete_only_when_done() {
        let store = InMemoryStore::new();
        assert!(!is_job_complete(&store, "job-001").await.unwrap());

        let mut job = job_fixture("job-001");
        put_job(&store, &job).await.unwrap();
        assert!(!is_job_complete(&store, "job-001").await.unwrap());

        job.mark_running().unwrap();
        job.mark_done().unwrap();
        put_job(&store, &job).await.unwrap();
        assert!(is_job_complete(&store, "job-001").await.unwrap());
    }

    #[tokio::test]
    async fn store_failures_propagate_unwrapped() {
        let store = InMemoryStore::new();
        store.set_offline(true).await;

        let err = put_job(&store, &job_fixture("job-001")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err = is_phase_complete(&store, "job-001", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
