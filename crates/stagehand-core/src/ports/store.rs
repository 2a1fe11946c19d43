//! RecordStore port - 整合性ストアの抽象化
//!
//! ストア本体はこのクレートの対象外です。プロトコルが要求するのは
//! upsert / list の 2 操作だけで、それをここで trait として切り出します。
//!
//! # 整合性について
//! - 各 upsert は 1 レコード単位でアトミック（複数レコードのトランザクションは無い）
//! - 書き込みの可視性は eventually consistent：成功した upsert が別の観測者の
//!   list にすぐ現れるとは限らない。観測側は poller で再評価する。

use async_trait::async_trait;

use crate::domain::StoreError;

/// Abstract interface over the consistency store backing the protocol.
///
/// Records are JSON documents; each bucket indexes its records by a parent
/// key (for this protocol, the `jobId` field) so `list` can fetch everything
/// correlated to one job in one call.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace exactly one record. Atomic for that record only.
    async fn upsert(
        &self,
        bucket: &str,
        id: &str,
        record: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// List the records of `bucket` whose parent key equals `parent_key`,
    /// in insertion order. The sequence is finite and restartable.
    async fn list(
        &self,
        bucket: &str,
        parent_key: &str,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
}
