//! App - アプリケーション層
//!
//! ports を組み合わせて完了プロトコルの操作を実装します。
//!
//! # 主要コンポーネント
//! - **records**: Job / TaskGroup の永続化と完了判定クエリ
//! - **CompletionEngine**: タスクグループ完了とフェーズ一括完了
//! - **poller**: 有限リトライの条件ポーラ（eventually consistent な状態の観測用）

pub mod completion;
pub mod poller;
pub mod records;

pub use self::completion::CompletionEngine;
pub use self::poller::{CheckFailed, PollPolicy, guard, poll};
