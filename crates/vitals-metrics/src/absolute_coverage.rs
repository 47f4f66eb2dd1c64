use chrono::{DateTime, Utc};
use vitals_core::metrics_api::{
    InsufficientData, LadderKind, MetricContext, MetricScore, ScoreLadder,
};

pub(crate) static LADDER: ScoreLadder = ScoreLadder {
    kind: LadderKind::Below,
    steps: &[
        (0.60, MetricScore::Poor),
        (0.75, MetricScore::Moderate),
        (0.90, MetricScore::Good),
    ],
    otherwise: MetricScore::Excellent,
};

/// Absolute code coverage, as reported by the coverage provider for the
/// latest commit before `base_time`, normalized from a percentage into
/// [0, 1].
pub(crate) async fn compute(
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<f64> {
    let head = ctx
        .store
        .latest_commit_before(base_time)?
        .ok_or_else(|| InsufficientData::new(format!("no commit available before {base_time}")))?;
    let coverage = ctx.coverage.absolute_coverage(&head.hash).await?;
    Ok(coverage.percentage / 100.0)
}
