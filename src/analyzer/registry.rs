//! Name-keyed analyzer registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{instrument, warn};

use super::{AnalysisReport, Analyzer};
use crate::telemetry;
use crate::{HuginnError, Result};

/// Framework name to analyzer lookup.
///
/// Registration happens during construction; the registry is then shared
/// read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `analyzer` under its own name, replacing any earlier one.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        let name = analyzer.name().to_string();
        if self.analyzers.insert(name.clone(), analyzer).is_some() {
            warn!(framework = %name, "replacing previously registered analyzer");
        }
    }

    /// Look up a framework.
    pub fn get(&self, framework: &str) -> Result<Arc<dyn Analyzer>> {
        self.analyzers
            .get(framework)
            .cloned()
            .ok_or_else(|| HuginnError::UnknownFramework(framework.to_string()))
    }

    pub fn contains(&self, framework: &str) -> bool {
        self.analyzers.contains_key(framework)
    }

    /// Registered framework names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.analyzers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Run every framework in `frameworks` over `content`.
    ///
    /// All names are resolved before any analyzer runs, so an unknown
    /// framework fails fast. Analyzers run one after another; the first
    /// error aborts the report.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn analyze(&self, content: &str, frameworks: &[String]) -> Result<AnalysisReport> {
        let analyzers = frameworks
            .iter()
            .map(|name| self.get(name).map(|analyzer| (name, analyzer)))
            .collect::<Result<Vec<_>>>()?;

        let mut report = AnalysisReport::new();
        for (name, analyzer) in analyzers {
            let start = Instant::now();
            let result = analyzer.analyze(content).await;
            Self::record_call(name, start, result.is_ok());
            match result {
                Ok(score) => {
                    report.insert(name.clone(), score);
                }
                Err(e) => {
                    warn!(framework = %name, error = %e, "analyzer failed");
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    fn record_call(framework: &str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::ANALYZER_CALLS_TOTAL,
            "framework" => framework.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::ANALYZER_DURATION_SECONDS,
            "framework" => framework.to_owned(),
        )
        .record(start.elapsed().as_secs_f64());
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("frameworks", &self.names())
            .finish()
    }
}
