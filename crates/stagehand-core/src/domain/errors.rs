//! Error taxonomy for the completion protocol.
//!
//! Local, recoverable conditions (one key failing inside a task group) are
//! recorded as data on the result record, not as errors. The types here cover
//! the systemic conditions that abort the enclosing operation.

use thiserror::Error;

/// Transport/availability failure from the record store adapter.
///
/// Always propagated to the caller of the operation that triggered it; the
/// model and the completion engine never retry on their own. Retry, if
/// desired, is the caller's job via the poller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded into, or decoded out of, its bucket.
    #[error("record codec failure in bucket {bucket}: {source}")]
    Codec {
        bucket: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A record failed a structural invariant at construction or mutation time.
///
/// Surfaced immediately; a record in this condition is never persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("job {job_id} has no phases")]
    NoPhases { job_id: String },

    #[error("duplicate input key {key} in job {job_id}")]
    DuplicateJobKey { job_id: String, key: String },

    #[error("duplicate input key {key} in task group {task_group_id}")]
    DuplicateGroupKey { task_group_id: String, key: String },

    #[error("key {key} is owned by both task group {first} and {second}")]
    OverlappingOwnership {
        key: String,
        first: String,
        second: String,
    },

    #[error("no task group of phase {phase_num} owns key {key}")]
    UncoveredKey { phase_num: u32, key: String },

    #[error("task group {task_group_id} owns key {key} outside the phase working set")]
    ForeignKey { task_group_id: String, key: String },

    #[error("task group {task_group_id} belongs to phase {actual}, expected {expected}")]
    PhaseMismatch {
        task_group_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("result for key {input} did not complete strictly after it started")]
    NonPositiveDuration { input: String },

    #[error("job {job_id} is {state} and cannot transition to {requested}")]
    InvalidTransition {
        job_id: String,
        state: String,
        requested: String,
    },

    #[error("job {job_id} cannot advance past its last phase ({phase_count} phases)")]
    PhaseOverrun { job_id: String, phase_count: usize },

    #[error("key {key} of job {job_id} is already settled as {settled_as}")]
    KeyAlreadySettled {
        job_id: String,
        key: String,
        settled_as: String,
    },
}

/// Umbrella for operations that can fail on either the store or an invariant.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// The poller's retry budget reached zero before its check succeeded.
///
/// Fatal by design: callers of the poller are drivers for which "the
/// condition never became true" is an unrecoverable outcome, not a branch.
#[derive(Debug, Error)]
#[error("check did not succeed after {attempts} attempts: {last_error}")]
pub struct PollExhausted<E>
where
    E: std::error::Error + 'static,
{
    /// Total number of check invocations made.
    pub attempts: u32,

    /// The failure reported by the final attempt.
    #[source]
    pub last_error: E,
}
