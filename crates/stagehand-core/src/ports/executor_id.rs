//! ExecutorIdSource port - 実行者 ID 生成の抽象化
//!
//! 結果レコードの `machine` フィールドに入る実行者 ID をここで生成します。
//! カウンタはモジュールグローバルではなくインスタンス状態として持つので、
//! 複数のドライバが並行しても衝突しません。

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Mints opaque executor identity tokens for result records.
pub trait ExecutorIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 uuids, one per call (production shape of the `machine` field).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidExecutorIds;

impl ExecutorIdSource for UuidExecutorIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Sequential `prefix-NNN` names from a driver-owned counter.
///
/// Useful for tests and for drivers that want stable, readable executor
/// names across a run.
#[derive(Debug)]
pub struct SequenceExecutorIds {
    prefix: String,
    next: AtomicU64,
}

impl SequenceExecutorIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl ExecutorIdSource for SequenceExecutorIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:03}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique_and_parseable() {
        let ids = UuidExecutorIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        Uuid::parse_str(&a).unwrap();
        Uuid::parse_str(&b).unwrap();
    }

    #[test]
    fn sequence_ids_count_up_from_zero() {
        let ids = SequenceExecutorIds::new("worker");
        assert_eq!(ids.next_id(), "worker-000");
        assert_eq!(ids.next_id(), "worker-001");
        assert_eq!(ids.next_id(), "worker-002");
    }

    #[test]
    fn independent_sequences_do_not_collide_on_state() {
        let a = SequenceExecutorIds::new("alpha");
        let b = SequenceExecutorIds::new("beta");
        assert_eq!(a.next_id(), "alpha-000");
        assert_eq!(b.next_id(), "beta-000");
        assert_eq!(a.next_id(), "alpha-001");
    }
}
