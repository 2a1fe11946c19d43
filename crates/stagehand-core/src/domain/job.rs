//! Job record and phase lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::InvariantViolation;
use super::task_group::{KeyOutcome, ResultRecord};

/// One ordered execution step of a job.
///
/// The descriptor is opaque to the protocol: the worker interprets it, the
/// protocol only orders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub exec: String,
}

impl PhaseSpec {
    pub fn new(exec: impl Into<String>) -> Self {
        Self { exec: exec.into() }
    }
}

/// Job state.
///
/// State transitions:
/// - Queued -> Running -> Done
/// - Queued -> Running -> Failed
/// - Queued -> Failed
///
/// Done and Failed are terminal; a job is never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    fn name(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

/// Job record: a unit of work divided into ordered phases over a fixed set
/// of input keys.
///
/// Design:
/// - Phases are fixed at construction; only `state`, `current_phase` and the
///   key accounting sets mutate afterwards, each through a method.
/// - `done_keys` and `discarded_keys` are mutually exclusive; `output_keys`
///   accumulates side-effect keys and may alias input keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub job_name: String,
    pub phases: Vec<PhaseSpec>,
    pub input_keys: Vec<String>,
    pub create_time: DateTime<Utc>,
    pub state: JobState,

    /// Zero-based index of the phase currently being worked.
    ///
    /// Absent from records written by older producers, hence the default.
    #[serde(default)]
    pub current_phase: usize,

    pub done_keys: Vec<String>,
    pub output_keys: Vec<String>,
    pub discarded_keys: Vec<String>,
}

impl JobRecord {
    /// Construct a queued job, validating its structural invariants.
    pub fn new(
        job_id: impl Into<String>,
        job_name: impl Into<String>,
        phases: Vec<PhaseSpec>,
        input_keys: Vec<String>,
        create_time: DateTime<Utc>,
    ) -> Result<Self, InvariantViolation> {
        let job_id = job_id.into();

        if phases.is_empty() {
            return Err(InvariantViolation::NoPhases { job_id });
        }

        let mut seen = std::collections::HashSet::new();
        for key in &input_keys {
            if !seen.insert(key.as_str()) {
                return Err(InvariantViolation::DuplicateJobKey {
                    job_id,
                    key: key.clone(),
                });
            }
        }

        Ok(Self {
            job_id,
            job_name: job_name.into(),
            phases,
            input_keys,
            create_time,
            state: JobState::Queued,
            current_phase: 0,
            done_keys: Vec::new(),
            output_keys: Vec::new(),
            discarded_keys: Vec::new(),
        })
    }

    /// Move from Queued to Running.
    pub fn mark_running(&mut self) -> Result<(), InvariantViolation> {
        match self.state {
            JobState::Queued => {
                self.state = JobState::Running;
                Ok(())
            }
            other => Err(self.invalid_transition(other, "running")),
        }
    }

    /// Advance to the next phase. Valid only while running and only if a
    /// next phase exists; the last phase ends with `mark_done`, not another
    /// advance.
    pub fn advance_phase(&mut self) -> Result<(), InvariantViolation> {
        if self.state != JobState::Running {
            return Err(self.invalid_transition(self.state, "next phase"));
        }

        if self.current_phase + 1 >= self.phases.len() {
            return Err(InvariantViolation::PhaseOverrun {
                job_id: self.job_id.clone(),
                phase_count: self.phases.len(),
            });
        }

        self.current_phase += 1;
        Ok(())
    }

    /// Move from Running to Done (terminal).
    pub fn mark_done(&mut self) -> Result<(), InvariantViolation> {
        match self.state {
            JobState::Running => {
                self.state = JobState::Done;
                Ok(())
            }
            other => Err(self.invalid_transition(other, "done")),
        }
    }

    /// Move from any non-terminal state to Failed (terminal).
    pub fn mark_failed(&mut self) -> Result<(), InvariantViolation> {
        if self.state.is_terminal() {
            return Err(self.invalid_transition(self.state, "failed"));
        }
        self.state = JobState::Failed;
        Ok(())
    }

    /// Fold one per-key result into the job's accounting sets.
    ///
    /// An `ok` result settles its input key as done; `fail` settles nothing
    /// (the key stays open for the driver to retry or discard). Output and
    /// discarded keys accumulate either way. Re-absorbing a result for an
    /// already-settled key is a no-op unless it would move the key across
    /// the done/discarded boundary.
    pub fn apply_result(&mut self, result: &ResultRecord) -> Result<(), InvariantViolation> {
        if result.result == KeyOutcome::Ok {
            self.settle_done(&result.input)?;
        }

        for key in &result.discarded {
            self.settle_discarded(key)?;
        }

        for key in &result.outputs {
            if !self.output_keys.contains(key) {
                self.output_keys.push(key.clone());
            }
        }

        Ok(())
    }

    fn settle_done(&mut self, key: &str) -> Result<(), InvariantViolation> {
        if self.discarded_keys.iter().any(|k| k == key) {
            return Err(InvariantViolation::KeyAlreadySettled {
                job_id: self.job_id.clone(),
                key: key.to_string(),
                settled_as: "discarded".to_string(),
            });
        }
        if !self.done_keys.iter().any(|k| k == key) {
            self.done_keys.push(key.to_string());
        }
        Ok(())
    }

    fn settle_discarded(&mut self, key: &str) -> Result<(), InvariantViolation> {
        if self.done_keys.iter().any(|k| k == key) {
            return Err(InvariantViolation::KeyAlreadySettled {
                job_id: self.job_id.clone(),
                key: key.to_string(),
                settled_as: "done".to_string(),
            });
        }
        if !self.discarded_keys.iter().any(|k| k == key) {
            self.discarded_keys.push(key.to_string());
        }
        Ok(())
    }

    fn invalid_transition(&self, from: JobState, requested: &str) -> InvariantViolation {
        InvariantViolation::InvalidTransition {
            job_id: self.job_id.clone(),
            state: from.name().to_string(),
            requested: requested.to_string(),
        }
    }
}
