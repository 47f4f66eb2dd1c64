use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, InsufficientData, LadderKind, MetricContext, MetricScore, ScoreLadder,
};
use vitals_core::model::BuildState;

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Below,
    steps: &[
        (0.60, MetricScore::Critical),
        (0.74, MetricScore::Poor),
        (0.90, MetricScore::Moderate),
        (0.95, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Percentage of completed builds which passed. Builds that are newly
/// created, pending, or canceled are excluded.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    tracing::info!("counting successful builds");
    let counts = ctx.store.build_state_counts(
        window_start(base_time),
        base_time,
        &BuildState::TERMINAL,
    )?;

    let passed = counts.get(&BuildState::Passed).copied().unwrap_or(0);
    let failed = counts.get(&BuildState::Failed).copied().unwrap_or(0);
    let errored = counts.get(&BuildState::Errored).copied().unwrap_or(0);

    let total = passed + failed + errored;
    if total == 0 {
        return Err(InsufficientData::new("no builds to process").into());
    }
    Ok(passed as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;
    use vitals_core::metrics_api::Metric;

    #[tokio::test]
    async fn computes_passed_share_of_terminal_builds() {
        let store = testutil::store();
        testutil::add_build_sequence(
            &store,
            &[
                BuildState::Passed,
                BuildState::Passed,
                BuildState::Passed,
                BuildState::Failed,
                BuildState::Errored,
                BuildState::Canceled, // excluded
                BuildState::Started,  // excluded
            ],
        );
        let ctx = testutil::context(store);
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        assert_eq!(value, 3.0 / 5.0);
    }

    #[tokio::test]
    async fn builds_outside_the_window_are_ignored() {
        let store = testutil::store();
        testutil::add_commit(&store, "old", testutil::days_ago(120));
        testutil::add_build(
            &store,
            1,
            BuildState::Passed,
            testutil::days_ago(120),
            Some(60.0),
            "old",
        );
        let ctx = testutil::context(store);
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert!(err.downcast_ref::<InsufficientData>().is_some());
    }

    #[tokio::test]
    async fn fails_without_any_builds() {
        let ctx = testutil::context(testutil::store());
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert_eq!(err.to_string(), "no builds to process");
    }

    #[test]
    fn score_boundaries() {
        let metric = MetricKind::BuildGreenness;
        assert_eq!(metric.score_value(0.50), MetricScore::Critical);
        assert_eq!(metric.score_value(0.60), MetricScore::Poor);
        assert_eq!(metric.score_value(0.74), MetricScore::Moderate);
        assert_eq!(metric.score_value(0.89), MetricScore::Moderate);
        assert_eq!(metric.score_value(0.90), MetricScore::Good);
        assert_eq!(metric.score_value(0.95), MetricScore::Excellent);
        assert_eq!(metric.score_value(1.0), MetricScore::Excellent);
    }

    #[test]
    fn formats_as_percentage() {
        assert_eq!(MetricKind::BuildGreenness.format_value(0.945), "94.5%");
    }
}
