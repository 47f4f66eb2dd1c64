use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{Metric, MetricContext, ScoreLadder};

pub mod backfill;
pub mod registry;

mod absolute_coverage;
mod build_flakiness;
mod build_greenness;
mod cherrypick_issue_count;
mod presubmit_ignored;
mod presubmit_latency;
mod release_granularity;

/// The closed set of health metrics. Each variant carries its threshold
/// ladder and computation in its own module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    BuildGreenness,
    BuildFlakiness,
    PresubmitLatency,
    PresubmitIgnored,
    ReleaseGranularity,
    CherrypickIssueCount,
    AbsoluteCoverage,
}

impl MetricKind {
    pub fn all() -> Vec<MetricKind> {
        vec![
            MetricKind::BuildGreenness,
            MetricKind::BuildFlakiness,
            MetricKind::PresubmitLatency,
            MetricKind::PresubmitIgnored,
            MetricKind::ReleaseGranularity,
            MetricKind::CherrypickIssueCount,
            MetricKind::AbsoluteCoverage,
        ]
    }
}

/// The metrics active by default, in display order.
pub fn default_metrics() -> Vec<MetricKind> {
    MetricKind::all()
}

pub(crate) fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[async_trait]
impl Metric for MetricKind {
    fn name(&self) -> &'static str {
        match self {
            MetricKind::BuildGreenness => "BuildGreennessMetric",
            MetricKind::BuildFlakiness => "BuildFlakinessMetric",
            MetricKind::PresubmitLatency => "PresubmitLatencyMetric",
            MetricKind::PresubmitIgnored => "PresubmitIgnoredMetric",
            MetricKind::ReleaseGranularity => "ReleaseGranularityMetric",
            MetricKind::CherrypickIssueCount => "CherrypickIssueCountMetric",
            MetricKind::AbsoluteCoverage => "AbsoluteCoverageMetric",
        }
    }

    fn ladder(&self) -> &'static ScoreLadder {
        match self {
            MetricKind::BuildGreenness => &build_greenness::LADDER,
            MetricKind::BuildFlakiness => &build_flakiness::LADDER,
            MetricKind::PresubmitLatency => &presubmit_latency::LADDER,
            MetricKind::PresubmitIgnored => &presubmit_ignored::LADDER,
            MetricKind::ReleaseGranularity => &release_granularity::LADDER,
            MetricKind::CherrypickIssueCount => &cherrypick_issue_count::LADDER,
            MetricKind::AbsoluteCoverage => &absolute_coverage::LADDER,
        }
    }

    fn format_value(&self, value: f64) -> String {
        match self {
            MetricKind::BuildGreenness
            | MetricKind::BuildFlakiness
            | MetricKind::AbsoluteCoverage => format_percentage(value),
            MetricKind::PresubmitLatency => presubmit_latency::format(value),
            MetricKind::PresubmitIgnored => presubmit_ignored::format(value),
            MetricKind::ReleaseGranularity => release_granularity::format(value),
            MetricKind::CherrypickIssueCount => cherrypick_issue_count::format(value),
        }
    }

    async fn compute_value(
        &self,
        ctx: &MetricContext,
        base_time: DateTime<Utc>,
    ) -> anyhow::Result<f64> {
        match self {
            MetricKind::BuildGreenness => build_greenness::compute(ctx, base_time).await,
            MetricKind::BuildFlakiness => build_flakiness::compute(ctx, base_time).await,
            MetricKind::PresubmitLatency => presubmit_latency::compute(ctx, base_time).await,
            MetricKind::PresubmitIgnored => presubmit_ignored::compute(ctx, base_time).await,
            MetricKind::ReleaseGranularity => release_granularity::compute(ctx, base_time).await,
            MetricKind::CherrypickIssueCount => {
                cherrypick_issue_count::compute(ctx, base_time).await
            }
            MetricKind::AbsoluteCoverage => absolute_coverage::compute(ctx, base_time).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;
    use vitals_core::metrics_api::MetricContext;
    use vitals_core::model::{Build, BuildState, Commit, CoverageValue, PullRequestStatus};
    use vitals_core::providers::codecov::CoverageProvider;
    use vitals_core::storage::store::Store;

    pub(crate) struct StubCoverage(pub Option<f64>);

    #[async_trait]
    impl CoverageProvider for StubCoverage {
        async fn absolute_coverage(&self, commit_hash: &str) -> anyhow::Result<CoverageValue> {
            match self.0 {
                Some(percentage) => Ok(CoverageValue {
                    commit_hash: commit_hash.to_string(),
                    percentage,
                }),
                None => anyhow::bail!("no coverage stubbed"),
            }
        }
    }

    pub(crate) fn store() -> Store {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    pub(crate) fn context_with(store: Store, coverage: Option<f64>) -> MetricContext {
        MetricContext {
            store,
            coverage: Arc::new(StubCoverage(coverage)),
        }
    }

    pub(crate) fn context(store: Store) -> MetricContext {
        context_with(store, None)
    }

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    pub(crate) fn days_ago(days: i64) -> DateTime<Utc> {
        base_time() - Duration::days(days)
    }

    pub(crate) fn add_commit(store: &Store, hash: &str, at: DateTime<Utc>) {
        store
            .insert_commit(&Commit {
                hash: hash.to_string(),
                committed_at: at,
                pull_request: None,
                pull_request_status: PullRequestStatus::Unknown,
            })
            .unwrap();
    }

    pub(crate) fn add_build(
        store: &Store,
        id: i64,
        state: BuildState,
        started_at: DateTime<Utc>,
        duration: Option<f64>,
        commit_hash: &str,
    ) {
        store
            .insert_build(&Build {
                id,
                number: id,
                duration,
                state,
                started_at: Some(started_at),
                commit_hash: Some(commit_hash.to_string()),
            })
            .unwrap();
    }

    /// One commit and one build per state, a minute apart, all inside the
    /// analysis window.
    pub(crate) fn add_build_sequence(store: &Store, states: &[BuildState]) {
        for (i, state) in states.iter().enumerate() {
            let at = days_ago(30) + Duration::minutes(i as i64);
            let hash = format!("hash{i:03}");
            add_commit(store, &hash, at);
            add_build(store, i as i64 + 1, *state, at, Some(1000.0), &hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable_storage_keys() {
        let names: Vec<_> = default_metrics().iter().map(|m| m.name()).collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"BuildGreennessMetric"));
        assert!(names.contains(&"AbsoluteCoverageMetric"));
    }

    #[test]
    fn labels_derive_from_names() {
        assert_eq!(MetricKind::BuildGreenness.label(), "Build Greenness");
        assert_eq!(MetricKind::PresubmitIgnored.label(), "Presubmit Ignored");
        assert_eq!(
            MetricKind::CherrypickIssueCount.label(),
            "Cherrypick Issue Count"
        );
    }

    #[test]
    fn formatting_never_fails_for_scoreable_values() {
        for metric in default_metrics() {
            for value in [0.0, 0.5, 1.0, 3.0, 42.0, 1800.0, 12345.6] {
                let _ = metric.score_value(value);
                assert!(!metric.format_value(value).is_empty());
            }
        }
    }
}
