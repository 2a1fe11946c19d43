//! CompletionEngine: compute and persist task group outcomes.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use super::records;
use crate::domain::{KeyOutcome, ProtocolError, ResultRecord, TaskGroupRecord};
use crate::ports::{Clock, ExecutorIdSource, RecordStore};

/// Completes task groups against the store.
///
/// The engine synthesizes the per-key results itself (outcome `ok`, outputs
/// `key + phaseNum`): that is the minimal contract for driving the protocol.
/// A deployment wiring in a real executor replaces the synthesis with the
/// executor's reported outputs; the record shape and the write path stay the
/// same.
pub struct CompletionEngine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    executor_ids: Arc<dyn ExecutorIdSource>,
}

impl CompletionEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        executor_ids: Arc<dyn ExecutorIdSource>,
    ) -> Self {
        Self {
            store,
            clock,
            executor_ids,
        }
    }

    /// Resolve the group's keys and persist the updated record.
    ///
    /// With `limit`, only the first `limit` owned keys (in ownership order)
    /// are resolved, leaving the group partially complete: that is how a
    /// worker crash mid-phase looks in the store, and how tests force an
    /// incomplete phase. Re-invocation recomputes the whole result list;
    /// previous results are overwritten, never merged.
    pub async fn complete_task_group(
        &self,
        group: &mut TaskGroupRecord,
        limit: Option<usize>,
    ) -> Result<(), ProtocolError> {
        let count = match limit {
            Some(n) => n.min(group.input_keys.len()),
            None => group.input_keys.len(),
        };

        let done_time = self.clock.now();
        let start_time = done_time - Duration::milliseconds(1);

        let mut results = Vec::with_capacity(count);
        for key in &group.input_keys[..count] {
            results.push(ResultRecord::new(
                self.executor_ids.next_id(),
                key,
                KeyOutcome::Ok,
                vec![format!("{key}{}", group.phase_num)],
                vec![],
                vec![],
                start_time,
                done_time,
            )?);
        }
        group.results = results;

        debug!(
            task_group_id = %group.task_group_id,
            resolved = group.results.len(),
            owned = group.input_keys.len(),
            "task group completed"
        );
        records::put_task_group(self.store.as_ref(), group).await?;
        Ok(())
    }

    /// Complete every task group of the given phase, with no limit.
    ///
    /// Group failures are independent: the sweep visits every group even if
    /// one fails, nothing already persisted is rolled back, and the first
    /// failure (if any) is returned once the sweep is over. A mixed outcome
    /// shows up as `is_phase_complete == false`.
    pub async fn finish_phase(&self, job_id: &str, phase_num: u32) -> Result<(), ProtocolError> {
        let mut groups =
            records::list_task_groups(self.store.as_ref(), job_id, Some(phase_num)).await?;

        let mut first_error = None;
        for group in &mut groups {
            if let Err(err) = self.complete_task_group(group, None).await {
                debug!(
                    task_group_id = %group.task_group_id,
                    error = %err,
                    "task group completion failed; continuing sweep"
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!(job_id, phase_num, groups = groups.len(), "phase finished");
                Ok(())
            }
        }
    }
}
