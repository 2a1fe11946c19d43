//! InMemoryStore - 開発用の整合性ストア
//!
//! # 実装詳細
//! - バケットごとに挿入順の Vec でレコードを管理
//! - 親キーは各レコードの `jobId` フィールド（このプロトコルの規約）
//! - `with_visibility_lag(n)` で eventual consistency を決定的に再現：
//!   書き込みは以後 n 回の list には現れず、その間は直前のコミット値が見える
//! - `set_offline(true)` で StoreError::Unavailable を強制（障害系のテスト用）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::RecordStore;

/// One record slot: the committed (visible) version plus an optional pending
/// write that becomes visible once enough list calls have passed.
#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    committed: Option<serde_json::Value>,
    pending: Option<PendingWrite>,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    value: serde_json::Value,
    /// First list-call number (per bucket) that observes this write.
    visible_at: u64,
}

#[derive(Debug, Default)]
struct BucketState {
    /// Insertion-ordered records; upserts replace in place.
    records: Vec<StoredRecord>,
    /// Number of list calls served so far on this bucket.
    list_calls: u64,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    buckets: HashMap<String, BucketState>,
    offline: bool,
}

/// In-memory record store.
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    visibility_lag: u64,
}

impl InMemoryStore {
    /// Store whose writes are visible to the next list call.
    pub fn new() -> Self {
        Self::with_visibility_lag(0)
    }

    /// Store whose writes stay invisible for the next `lag` list calls on
    /// their bucket; readers see the previous committed value (or nothing,
    /// for a fresh record) until the write settles.
    pub fn with_visibility_lag(lag: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::default())),
            visibility_lag: lag,
        }
    }

    /// Make subsequent operations fail with `StoreError::Unavailable`.
    pub async fn set_offline(&self, offline: bool) {
        let mut state = self.state.lock().await;
        state.offline = offline;
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_key_of(id: &str, value: &serde_json::Value) -> String {
    value
        .get("jobId")
        .and_then(|v| v.as_str())
        .unwrap_or(id)
        .to_string()
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn upsert(
        &self,
        bucket: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }

        let bucket = state.buckets.entry(bucket.to_string()).or_default();
        let pending = PendingWrite {
            value: record,
            visible_at: bucket.list_calls + self.visibility_lag + 1,
        };

        match bucket.records.iter_mut().find(|r| r.id == id) {
            Some(slot) => slot.pending = Some(pending),
            None => bucket.records.push(StoredRecord {
                id: id.to_string(),
                committed: None,
                pending: Some(pending),
            }),
        }

        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        parent_key: &str,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }

        let bucket = state.buckets.entry(bucket.to_string()).or_default();
        bucket.list_calls += 1;
        let call = bucket.list_calls;

        let mut out = Vec::new();
        for slot in &mut bucket.records {
            if slot.pending.as_ref().is_some_and(|p| p.visible_at <= call)
                && let Some(pending) = slot.pending.take()
            {
                slot.committed = Some(pending.value);
            }

            if let Some(value) = &slot.committed
                && parent_key_of(&slot.id, value) == parent_key
            {
                out.push(value.clone());
            }
        }

        Ok(out)
    }
}
