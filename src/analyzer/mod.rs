//! Analysis frameworks.
//!
//! Scoring algorithms live outside this crate. Callers implement
//! [`Analyzer`] once per framework and register the implementations in an
//! [`AnalyzerRegistry`]; batches then name frameworks by string and the
//! registry resolves them at call time.
//!
//! # Example
//!
//! ```ignore
//! struct WordCount;
//!
//! #[async_trait]
//! impl Analyzer for WordCount {
//!     fn name(&self) -> &str {
//!         "WORDS"
//!     }
//!
//!     async fn analyze(&self, content: &str) -> Result<ScoreResult> {
//!         Ok(ScoreResult::new(content.split_whitespace().count() as f64))
//!     }
//! }
//! ```

mod registry;

pub use registry::AnalyzerRegistry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A pluggable scoring strategy for one framework.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Framework name this analyzer is registered under (e.g. "STEPPS").
    fn name(&self) -> &str;

    /// Score `content`.
    ///
    /// Errors stay confined to the item being analyzed.
    async fn analyze(&self, content: &str) -> Result<ScoreResult>;
}

/// One framework's verdict on one piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    /// Framework-specific breakdown.
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ScoreResult {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            details: Value::Null,
            recommendations: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }
}

/// Results for every requested framework, keyed by framework name.
pub type AnalysisReport = BTreeMap<String, ScoreResult>;
