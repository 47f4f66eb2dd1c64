use crate::providers::codecov::CoverageProvider;
use crate::storage::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Number of trailing days every windowed metric is computed over.
pub const ANALYSIS_WINDOW_DAYS: i64 = 90;

/// The computed score of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricScore {
    Unknown,
    Critical,
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl fmt::Display for MetricScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricScore::Unknown => "UNKNOWN",
            MetricScore::Critical => "CRITICAL",
            MetricScore::Poor => "POOR",
            MetricScore::Moderate => "MODERATE",
            MetricScore::Good => "GOOD",
            MetricScore::Excellent => "EXCELLENT",
        };
        f.write_str(s)
    }
}

/// How a ladder step's bound is compared against the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderKind {
    /// First step whose bound the value falls strictly below wins.
    Below,
    /// First step whose bound the value exceeds strictly wins.
    Above,
    /// First step whose bound the value meets or exceeds wins.
    AtLeast,
}

/// An ordered table of half-open score buckets. Each metric carries its own
/// ladder as data; steps are checked in declaration order and the first
/// match wins, falling through to `otherwise`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreLadder {
    pub kind: LadderKind,
    pub steps: &'static [(f64, MetricScore)],
    pub otherwise: MetricScore,
}

impl ScoreLadder {
    pub fn score(&self, value: f64) -> MetricScore {
        for &(bound, score) in self.steps {
            let matched = match self.kind {
                LadderKind::Below => value < bound,
                LadderKind::Above => value > bound,
                LadderKind::AtLeast => value >= bound,
            };
            if matched {
                return score;
            }
        }
        self.otherwise
    }
}

/// Raised by a metric computation that has too little data to produce a
/// meaningful value. The message states the specific deficiency.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InsufficientData(pub String);

impl InsufficientData {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Lookup of a metric name that is not registered.
#[derive(Debug, Error)]
#[error("no active metric named {0}")]
pub struct UnknownMetric(pub String);

/// Everything a metric computation may read from: the record store and the
/// live coverage provider.
#[derive(Clone)]
pub struct MetricContext {
    pub store: Store,
    pub coverage: Arc<dyn CoverageProvider>,
}

/// Capability interface every health metric exposes.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Stable identifier, used as the storage key for results.
    fn name(&self) -> &'static str;

    /// Human-readable title (ex. `BuildGreennessMetric` -> "Build Greenness").
    fn label(&self) -> String {
        derive_label(self.name())
    }

    /// The score bucket table for this metric.
    fn ladder(&self) -> &'static ScoreLadder;

    /// Place a raw value into one of the defined score buckets.
    fn score_value(&self, value: f64) -> MetricScore {
        self.ladder().score(value)
    }

    /// Render the raw value for display (ex. 3m, 80.0%, 100PRs).
    fn format_value(&self, value: f64) -> String;

    /// Compute the metric as of `base_time`. Pure with respect to the store;
    /// fails with [`InsufficientData`] when too few records exist.
    async fn compute_value(
        &self,
        ctx: &MetricContext,
        base_time: DateTime<Utc>,
    ) -> anyhow::Result<f64>;
}

/// Start of the trailing analysis window anchored at `base_time`.
pub fn window_start(base_time: DateTime<Utc>) -> DateTime<Utc> {
    base_time - chrono::Duration::days(ANALYSIS_WINDOW_DAYS)
}

/// Derive a display label from a metric name: the conventional `Metric`
/// suffix is stripped and the camel-case identifier split into words.
pub fn derive_label(name: &str) -> String {
    let stem = name.strip_suffix("Metric").unwrap_or(name);
    let mut label = String::with_capacity(stem.len() + 4);
    for (i, ch) in stem.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            label.push(' ');
        }
        label.push(ch);
    }
    label
}

/// The latest known state of one metric, shaped for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub name: String,
    pub label: String,
    pub value: Option<f64>,
    pub formatted_result: String,
    pub score: MetricScore,
    pub computed_at: Option<DateTime<Utc>>,
}
