use crate::MetricKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use vitals_core::metrics_api::{
    Metric, MetricContext, MetricScore, MetricSnapshot, UnknownMetric,
};
use vitals_core::model::MetricResult;
use vitals_core::storage::store::Store;

/// Explicit registry of active metrics, built once at startup and passed by
/// reference to whatever drives recomputation.
pub struct MetricRegistry {
    metrics: Vec<MetricKind>,
}

impl MetricRegistry {
    pub fn new(metrics: Vec<MetricKind>) -> Self {
        Self { metrics }
    }

    pub fn with_default_metrics() -> Self {
        Self::new(crate::default_metrics())
    }

    pub fn metrics(&self) -> &[MetricKind] {
        &self.metrics
    }

    pub fn active_metrics(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    pub fn get(&self, name: &str) -> anyhow::Result<MetricKind> {
        self.metrics
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| UnknownMetric(name.to_string()).into())
    }

    /// Compute a metric and append the result, stamped with `base_time`
    /// (now, unless backfilling). Prior results are never touched.
    pub async fn recompute(
        &self,
        name: &str,
        ctx: &MetricContext,
        base_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MetricResult> {
        let metric = self.get(name)?;
        self.recompute_metric(metric, ctx, base_time).await
    }

    pub async fn recompute_metric(
        &self,
        metric: MetricKind,
        ctx: &MetricContext,
        base_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<MetricResult> {
        let computed_at = base_time.unwrap_or_else(Utc::now);
        let value = metric.compute_value(ctx, computed_at).await?;
        let result = ctx
            .store
            .insert_metric_result(metric.name(), value, computed_at)?;
        tracing::info!(
            metric = metric.name(),
            value,
            computed_at = %computed_at,
            "recomputed metric"
        );
        Ok(result)
    }

    /// The latest stored result for every registered metric, shaped for
    /// display. Metrics that have never been computed report an UNKNOWN
    /// score and a "?" value.
    pub fn get_latest(&self, store: &Store) -> anyhow::Result<BTreeMap<String, MetricSnapshot>> {
        let names = self.active_metrics();
        let results = store.latest_metric_results(&names)?;
        let by_name: BTreeMap<&str, &MetricResult> =
            results.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut latest = BTreeMap::new();
        for metric in &self.metrics {
            let snapshot = match by_name.get(metric.name()) {
                Some(result) => MetricSnapshot {
                    name: result.name.clone(),
                    label: metric.label(),
                    value: Some(result.value),
                    formatted_result: metric.format_value(result.value),
                    score: metric.score_value(result.value),
                    computed_at: Some(result.computed_at),
                },
                None => MetricSnapshot {
                    name: metric.name().to_string(),
                    label: metric.label(),
                    value: None,
                    formatted_result: "?".to_string(),
                    score: MetricScore::Unknown,
                    computed_at: None,
                },
            };
            latest.insert(metric.name().to_string(), snapshot);
        }
        Ok(latest)
    }
}
