//! Task group record and per-key results.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::InvariantViolation;

/// Outcome of processing one key.
///
/// A failed key is data, not an error: it stays on the record so the driver
/// can decide what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOutcome {
    Ok,
    Fail,
}

/// The outcome of processing one input key within a task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Executor identity (opaque token, typically a machine uuid).
    pub machine: String,

    /// The input key this result settles.
    pub input: String,

    pub result: KeyOutcome,

    /// Keys produced as side effects of processing `input`.
    pub outputs: Vec<String>,

    pub discarded: Vec<String>,

    /// Partial-output markers left behind by an interrupted executor.
    pub partials: Vec<String>,

    pub start_time: DateTime<Utc>,
    pub done_time: DateTime<Utc>,
}

impl ResultRecord {
    /// Construct a result record, enforcing that completion happened
    /// strictly after the start.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        machine: impl Into<String>,
        input: impl Into<String>,
        result: KeyOutcome,
        outputs: Vec<String>,
        discarded: Vec<String>,
        partials: Vec<String>,
        start_time: DateTime<Utc>,
        done_time: DateTime<Utc>,
    ) -> Result<Self, InvariantViolation> {
        let input = input.into();
        if done_time <= start_time {
            return Err(InvariantViolation::NonPositiveDuration { input });
        }
        Ok(Self {
            machine: machine.into(),
            input,
            result,
            outputs,
            discarded,
            partials,
            start_time,
            done_time,
        })
    }
}

/// The record of one partition of a phase's key set, plus its per-key
/// outcomes.
///
/// Task groups are independently addressable store records correlated to a
/// job by id and to a phase by index; the job never owns them in memory.
/// They are written once at creation, once at completion, and never deleted
/// (each is an audit record).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroupRecord {
    pub task_group_id: String,

    /// Back-reference to the owning job; the store indexes on it.
    pub job_id: String,

    pub phase_num: u32,

    /// Keys this group owns, disjoint from sibling groups of the phase.
    pub input_keys: Vec<String>,

    /// Populated on completion.
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

impl TaskGroupRecord {
    /// Construct an unresolved task group, validating key uniqueness.
    pub fn new(
        task_group_id: impl Into<String>,
        job_id: impl Into<String>,
        phase_num: u32,
        input_keys: Vec<String>,
    ) -> Result<Self, InvariantViolation> {
        let task_group_id = task_group_id.into();

        let mut seen = HashSet::new();
        for key in &input_keys {
            if !seen.insert(key.as_str()) {
                return Err(InvariantViolation::DuplicateGroupKey {
                    task_group_id,
                    key: key.clone(),
                });
            }
        }

        Ok(Self {
            task_group_id,
            job_id: job_id.into(),
            phase_num,
            input_keys,
            results: Vec::new(),
        })
    }

    /// True iff every owned key has exactly one result record and no result
    /// refers to a key outside the owned set.
    ///
    /// An empty result list is never fully resolved, which also keeps a
    /// zero-key group from reading as complete.
    pub fn is_fully_resolved(&self) -> bool {
        if self.results.is_empty() || self.results.len() != self.input_keys.len() {
            return false;
        }

        let mut unresolved: HashSet<&str> = self.input_keys.iter().map(String::as_str).collect();
        for result in &self.results {
            if !unresolved.remove(result.input.as_str()) {
                // duplicate result for a key, or a key this group does not own
                return false;
            }
        }
        unresolved.is_empty()
    }
}

/// Validate that a set of sibling task groups partitions a phase's working
/// set: same phase, pairwise-disjoint key ownership, and exact coverage.
pub fn validate_phase_partition(
    groups: &[TaskGroupRecord],
    phase_num: u32,
    working_set: &[String],
) -> Result<(), InvariantViolation> {
    let working: HashSet<&str> = working_set.iter().map(String::as_str).collect();
    let mut owner_of: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();

    for group in groups {
        if group.phase_num != phase_num {
            return Err(InvariantViolation::PhaseMismatch {
                task_group_id: group.task_group_id.clone(),
                expected: phase_num,
                actual: group.phase_num,
            });
        }

        for key in &group.input_keys {
            if !working.contains(key.as_str()) {
                return Err(InvariantViolation::ForeignKey {
                    task_group_id: group.task_group_id.clone(),
                    key: key.clone(),
                });
            }
            if let Some(first) = owner_of.insert(key.as_str(), group.task_group_id.as_str()) {
                return Err(InvariantViolation::OverlappingOwnership {
                    key: key.clone(),
                    first: first.to_string(),
                    second: group.task_group_id.clone(),
                });
            }
        }
    }

    for key in &working {
        if !owner_of.contains_key(key) {
            return Err(InvariantViolation::UncoveredKey {
                phase_num,
                key: key.to_string(),
            });
        }
    }

    Ok(())
}
