//! Huginn - concurrent batch analysis with an expiring, evicting cache
//!
//! This crate runs batches of text items through pluggable analysis
//! frameworks. A [`BatchCoordinator`] schedules items by priority across a
//! small worker pool, isolates per-item failures, and honours cancellation
//! and an overall timeout. Results are cached in a [`CacheManager`] whose
//! instances combine TTL expiry, strict LRU eviction, tag invalidation and
//! optional on-disk snapshots.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use huginn::{Analyzer, Huginn, ScoreResult, SubmitBatchRequest};
//!
//! struct Length;
//!
//! #[async_trait]
//! impl Analyzer for Length {
//!     fn name(&self) -> &str {
//!         "LENGTH"
//!     }
//!
//!     async fn analyze(&self, content: &str) -> huginn::Result<ScoreResult> {
//!         Ok(ScoreResult::new(content.len() as f64))
//!     }
//! }
//!
//! # async fn run() -> huginn::Result<()> {
//! let huginn = Huginn::builder().analyzer(Arc::new(Length)).build()?;
//!
//! let report = huginn
//!     .submit_batch(SubmitBatchRequest {
//!         batch_id: "demo".into(),
//!         items: vec!["first".into(), "second".into()],
//!         frameworks: Some(vec!["LENGTH".into()]),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! println!("{:.0}% succeeded", report.summary.success_rate);
//! huginn.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use analyzer::{AnalysisReport, Analyzer, AnalyzerRegistry, ScoreResult};
pub use batch::{
    BatchCoordinator, BatchReport, BatchRequest, BatchStatus, BatchSummary, ItemInput,
    ItemOutcome, ItemResult,
};
pub use cache::{CacheConfig, CacheInstance, CacheManager, CacheStats};
pub use config::Config;
pub use error::{HuginnError, Result};
pub use service::{Huginn, HuginnBuilder, SubmitBatchRequest};
pub use version::{PKG_VERSION, version_string};
