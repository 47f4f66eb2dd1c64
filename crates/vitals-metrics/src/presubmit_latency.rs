use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, InsufficientData, LadderKind, MetricContext, MetricScore, ScoreLadder,
};

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Above,
    steps: &[
        (1800.0, MetricScore::Critical),
        (1500.0, MetricScore::Poor),
        (1200.0, MetricScore::Moderate),
        (900.0, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Mean duration, in seconds, of completed presubmit builds in the window.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    let mean = ctx
        .store
        .mean_build_duration(window_start(base_time), base_time)?;
    mean.ok_or_else(|| InsufficientData::new("no builds in window").into())
}

pub(crate) fn format(avg_seconds: f64) -> String {
    format!("{}m", (avg_seconds / 60.0).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;
    use vitals_core::metrics_api::Metric;
    use vitals_core::model::BuildState;

    #[tokio::test]
    async fn averages_terminal_build_durations() {
        let store = testutil::store();
        let at = testutil::days_ago(10);
        testutil::add_commit(&store, "c1", at);
        testutil::add_build(&store, 1, BuildState::Passed, at, Some(60.0), "c1");
        testutil::add_build(&store, 2, BuildState::Failed, at, Some(120.0), "c1");
        // Excluded states carry no latency signal.
        testutil::add_build(&store, 3, BuildState::Canceled, at, Some(999.0), "c1");
        testutil::add_build(&store, 4, BuildState::Started, at, None, "c1");

        let ctx = testutil::context(store);
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        assert_eq!(value, 90.0);
    }

    #[tokio::test]
    async fn fails_without_builds_in_window() {
        let ctx = testutil::context(testutil::store());
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert_eq!(err.to_string(), "no builds in window");
    }

    #[test]
    fn score_boundaries() {
        let metric = MetricKind::PresubmitLatency;
        assert_eq!(metric.score_value(2000.0), MetricScore::Critical);
        assert_eq!(metric.score_value(1800.0), MetricScore::Poor);
        assert_eq!(metric.score_value(1500.0), MetricScore::Moderate);
        assert_eq!(metric.score_value(1200.0), MetricScore::Good);
        assert_eq!(metric.score_value(900.0), MetricScore::Excellent);
        assert_eq!(metric.score_value(300.0), MetricScore::Excellent);
    }

    #[test]
    fn formats_whole_minutes() {
        assert_eq!(format(1234.0), "20m");
        assert_eq!(format(59.0), "0m");
    }
}
