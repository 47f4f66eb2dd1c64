use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, InsufficientData, LadderKind, MetricContext, MetricScore, ScoreLadder,
};
use vitals_core::model::BuildState;

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::AtLeast,
    steps: &[
        (0.20, MetricScore::Critical),
        (0.07, MetricScore::Poor),
        (0.02, MetricScore::Moderate),
        (0.01, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Percentage of flaky builds: any failing build surrounded by two passing
/// builds (pass-fail-pass) in commit order. Canceled builds take no part in
/// the sequence or the denominator; an errored build counts as failing.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    tracing::info!("counting flaky builds");
    let builds = ctx.store.builds_by_commit_time(
        window_start(base_time),
        base_time,
        &BuildState::TERMINAL,
    )?;

    if builds.is_empty() {
        return Err(InsufficientData::new("no builds to process").into());
    }
    if builds.len() < 3 {
        return Err(InsufficientData::new("not enough builds to determine flakiness").into());
    }

    let flakes = builds
        .windows(3)
        .filter(|w| {
            w[0].state == BuildState::Passed
                && w[1].state != BuildState::Passed
                && w[2].state == BuildState::Passed
        })
        .count();

    Ok(flakes as f64 / builds.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;
    use vitals_core::metrics_api::Metric;

    #[tokio::test]
    async fn counts_pass_fail_pass_triples() {
        let store = testutil::store();
        testutil::add_build_sequence(
            &store,
            &[
                BuildState::Passed,
                BuildState::Passed,
                // flake
                BuildState::Passed,
                BuildState::Failed,
                BuildState::Passed,
                // true failures, not flakes
                BuildState::Failed,
                BuildState::Failed,
                // flake, with the canceled build dropped from the sequence
                BuildState::Passed,
                BuildState::Failed,
                BuildState::Canceled,
                BuildState::Passed,
                // flake, errored counts as failing
                BuildState::Passed,
                BuildState::Errored,
                BuildState::Passed,
                // not a flake, the next build is unknown
                BuildState::Passed,
                BuildState::Failed,
            ],
        );
        let ctx = testutil::context(store);
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        // 3 flakes over 15 qualifying builds.
        assert_eq!(value, 0.2);
    }

    #[tokio::test]
    async fn fails_without_any_builds() {
        let ctx = testutil::context(testutil::store());
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert_eq!(err.to_string(), "no builds to process");
    }

    #[tokio::test]
    async fn fails_with_fewer_than_three_builds() {
        let store = testutil::store();
        testutil::add_build_sequence(&store, &[BuildState::Passed, BuildState::Passed]);
        let ctx = testutil::context(store);
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert_eq!(err.to_string(), "not enough builds to determine flakiness");
    }

    #[test]
    fn score_boundaries() {
        let metric = MetricKind::BuildFlakiness;
        assert_eq!(metric.score_value(0.30), MetricScore::Critical);
        assert_eq!(metric.score_value(0.20), MetricScore::Critical);
        assert_eq!(metric.score_value(0.10), MetricScore::Poor);
        assert_eq!(metric.score_value(0.07), MetricScore::Poor);
        assert_eq!(metric.score_value(0.05), MetricScore::Moderate);
        assert_eq!(metric.score_value(0.02), MetricScore::Moderate);
        assert_eq!(metric.score_value(0.015), MetricScore::Good);
        assert_eq!(metric.score_value(0.01), MetricScore::Good);
        assert_eq!(metric.score_value(0.005), MetricScore::Excellent);
        assert_eq!(metric.score_value(0.0), MetricScore::Excellent);
    }

    #[test]
    fn formats_as_percentage() {
        assert_eq!(MetricKind::BuildFlakiness.format_value(0.5), "50.0%");
    }
}
