use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, InsufficientData, LadderKind, MetricContext, MetricScore, ScoreLadder,
};

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Above,
    steps: &[
        (1000.0, MetricScore::Critical),
        (500.0, MetricScore::Poor),
        (100.0, MetricScore::Moderate),
        (10.0, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Average number of commits per release over the window: all commits
/// committed between the first and last release of the window, divided by
/// the release count excluding the last one, whose commits are not covered
/// by the range.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    tracing::info!("counting commits per release");
    let releases = ctx
        .store
        .releases_in_window(window_start(base_time), base_time)?;

    if releases.len() < 2 {
        return Err(
            InsufficientData::new("not enough releases to determine a range of commits").into(),
        );
    }

    // Newest first.
    let last_release_date = releases[0].published_at;
    let first_release_date = releases[releases.len() - 1].published_at;
    let commit_count = ctx
        .store
        .count_commits_between(first_release_date, last_release_date)?;

    Ok(commit_count as f64 / (releases.len() - 1) as f64)
}

pub(crate) fn format(avg_commits: f64) -> String {
    format!("{} c/r", avg_commits.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;
    use vitals_core::metrics_api::Metric;
    use vitals_core::model::NewRelease;

    fn add_release(store: &vitals_core::storage::store::Store, name: &str, days: i64) {
        store
            .insert_release(&NewRelease {
                published_at: testutil::days_ago(days),
                name: name.to_string(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn averages_commits_between_window_releases() {
        let store = testutil::store();
        for (name, days) in [("r100", 100), ("r80", 80), ("r40", 40), ("r10", 10)] {
            add_release(&store, name, days);
        }
        for (i, days) in [95, 85, 75, 50, 25, 20, 5].iter().enumerate() {
            testutil::add_commit(&store, &format!("c{i}"), testutil::days_ago(*days));
        }

        let ctx = testutil::context(store);
        let value = compute(&ctx, testutil::base_time()).await.unwrap();
        // Window keeps 3 releases; 4 commits lie between the day-80 and
        // day-10 releases; 4 / (3 - 1).
        assert_eq!(value, 2.0);
    }

    #[tokio::test]
    async fn fails_with_fewer_than_two_releases() {
        let store = testutil::store();
        add_release(&store, "only", 10);
        let ctx = testutil::context(store);
        let err = compute(&ctx, testutil::base_time()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "not enough releases to determine a range of commits"
        );
    }

    #[test]
    fn score_boundaries() {
        let metric = MetricKind::ReleaseGranularity;
        assert_eq!(metric.score_value(1500.0), MetricScore::Critical);
        assert_eq!(metric.score_value(1000.0), MetricScore::Poor);
        assert_eq!(metric.score_value(750.0), MetricScore::Poor);
        assert_eq!(metric.score_value(500.0), MetricScore::Moderate);
        assert_eq!(metric.score_value(250.0), MetricScore::Moderate);
        assert_eq!(metric.score_value(100.0), MetricScore::Good);
        assert_eq!(metric.score_value(50.0), MetricScore::Good);
        assert_eq!(metric.score_value(10.0), MetricScore::Excellent);
        assert_eq!(metric.score_value(5.0), MetricScore::Excellent);
    }

    #[test]
    fn formats_rounded_commits_per_release() {
        assert_eq!(format(15.6), "16 c/r");
    }
}
