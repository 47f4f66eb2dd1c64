use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, LadderKind, MetricContext, MetricScore, ScoreLadder,
};
use vitals_core::model::BuildState;

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Above,
    steps: &[
        (20.0, MetricScore::Poor),
        (6.0, MetricScore::Moderate),
        (3.0, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Number of pull requests that landed with a failing presubmit build.
/// Zero is a valid result.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    let count = ctx.store.count_builds_in_states(
        window_start(base_time),
        base_time,
        &[BuildState::Failed, BuildState::Errored],
    )?;
    Ok(count as f64)
}

pub(crate) fn format(ignored: f64) -> String {
    let n = ignored.round() as i64;
    if n == 1 {
        "1PR/90d".to_string()
    } else {
        format!("{n}PRs/90d")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;
    use vitals_core::metrics_api::Metric;

    #[tokio::test]
    async fn counts_failed_and_errored_builds() {
        let store = testutil::store();
        testutil::add_build_sequence(
            &store,
            &[
                BuildState::Passed,
                BuildState::Canceled,
                BuildState::Passed,
                BuildState::Errored,
                BuildState::Failed,
            ],
        );
        let ctx = testutil::context(store);
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        assert_eq!(value, 2.0);
    }

    #[tokio::test]
    async fn zero_is_a_valid_result() {
        let ctx = testutil::context(testutil::store());
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn score_boundaries() {
        let metric = MetricKind::PresubmitIgnored;
        assert_eq!(metric.score_value(25.0), MetricScore::Poor);
        assert_eq!(metric.score_value(20.0), MetricScore::Moderate);
        assert_eq!(metric.score_value(7.0), MetricScore::Moderate);
        assert_eq!(metric.score_value(6.0), MetricScore::Good);
        assert_eq!(metric.score_value(4.0), MetricScore::Good);
        assert_eq!(metric.score_value(3.0), MetricScore::Excellent);
        assert_eq!(metric.score_value(0.0), MetricScore::Excellent);
    }

    #[test]
    fn formats_with_singular_and_plural() {
        assert_eq!(format(1.0), "1PR/90d");
        assert_eq!(format(0.0), "0PRs/90d");
        assert_eq!(format(12.0), "12PRs/90d");
    }
}
