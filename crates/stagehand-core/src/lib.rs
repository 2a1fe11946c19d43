//! stagehand-core
//!
//! Core building blocks for the Stagehand completion protocol: a job runs in
//! ordered phases, each phase's input keys are partitioned into task groups,
//! and per-key results are written back through an eventually-consistent
//! record store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（JobRecord, TaskGroupRecord, ResultRecord, エラー型）
//! - **ports**: 抽象化レイヤー（RecordStore, Clock, ExecutorIdSource）
//! - **app**: アプリケーションロジック（records, CompletionEngine, poller）
//! - **impls**: 実装（InMemoryStore など開発用）

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;
