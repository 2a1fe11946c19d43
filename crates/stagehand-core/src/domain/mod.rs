//! Domain model (records, state machines, invariants).

pub mod errors;
pub mod job;
pub mod task_group;

pub use self::errors::{InvariantViolation, PollExhausted, ProtocolError, StoreError};
pub use self::job::{JobRecord, JobState, PhaseSpec};
pub use self::task_group::{KeyOutcome, ResultRecord, TaskGroupRecord, validate_phase_partition};
