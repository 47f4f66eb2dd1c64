use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    window_start, LadderKind, MetricContext, MetricScore, ScoreLadder,
};

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Above,
    steps: &[
        (10.0, MetricScore::Critical),
        (5.0, MetricScore::Poor),
        (3.0, MetricScore::Moderate),
        (1.0, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Number of cherry-pick tracking issues opened in the window. Zero is a
/// valid result.
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    tracing::info!("counting cherry-picks");
    let count = ctx
        .store
        .count_cherrypick_issues(window_start(base_time), base_time)?;
    Ok(count as f64)
}

pub(crate) fn format(num_cherrypicks: f64) -> String {
    let n = num_cherrypicks.round() as i64;
    format!("{n} CP{}/90d", if n > 1 { "s" } else { "" })
}
