use crate::registry::MetricRegistry;
use chrono::{DateTime, Utc};
use std::time::Duration;
use vitals_core::metrics_api::{InsufficientData, Metric, MetricContext};
use vitals_core::providers::{ProviderError, Providers};
use vitals_core::scrapers::{self, ScrapeTarget};

const BACKOFF_INITIAL: Duration = Duration::from_secs(5);
const BACKOFF_LIMIT: Duration = Duration::from_secs(30 * 60);

/// Days of history to scrape: the backfill window plus one full analysis
/// window so the oldest weekly recompute still sees 90 days of records.
const SCRAPE_LOOKBACK_DAYS: i64 = 365 + 90;

const BACKFILL_DAYS: i64 = 365;

/// Exponential backoff for provider rate limits. Doubles on every hit up to
/// a hard ceiling; exceeding the ceiling aborts the enclosing operation.
pub struct RateLimiter {
    backoff: Duration,
    limit: Duration,
    initial: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_policy(BACKOFF_INITIAL, BACKOFF_LIMIT)
    }

    pub fn with_policy(initial: Duration, limit: Duration) -> Self {
        Self {
            backoff: initial,
            limit,
            initial,
        }
    }

    pub async fn backoff(&mut self) -> anyhow::Result<()> {
        if self.backoff > self.limit {
            anyhow::bail!("rate-limit backoff exceeds limit; giving up");
        }
        tracing::warn!(seconds = self.backoff.as_secs(), "hit rate limit; backing off");
        tokio::time::sleep(self.backoff).await;
        self.backoff *= 2;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.backoff = self.initial;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_rate_limit(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ProviderError>()
        .is_some_and(ProviderError::is_rate_limit)
}

/// Historically scrape every target back far enough to cover the whole
/// backfill range. A rate-limited target is retried with backoff; any other
/// provider failure aborts the run.
pub async fn scrape_all(
    providers: &Providers,
    ctx: &MetricContext,
    targets: &[ScrapeTarget],
) -> anyhow::Result<()> {
    let since = Utc::now() - chrono::Duration::days(SCRAPE_LOOKBACK_DAYS);
    let mut limiter = RateLimiter::new();
    for target in targets {
        loop {
            match scrapers::scrape_historical(*target, providers, &ctx.store, since).await {
                Ok(()) => break,
                Err(e) if is_rate_limit(&e) => {
                    tracing::error!(target_name = target.as_str(), error = %e, "scrape rate-limited");
                    limiter.backoff().await?;
                }
                Err(e) => return Err(e),
            }
        }
        limiter.reset();
    }
    Ok(())
}

/// Recompute every registered metric as of `base_time`. A metric without
/// enough data at that point in history is skipped; the rest of the week's
/// metrics still run.
pub async fn compute_week(
    registry: &MetricRegistry,
    ctx: &MetricContext,
    base_time: DateTime<Utc>,
) -> anyhow::Result<()> {
    tracing::info!(week = %base_time.format("%Y-%m-%d"), "computing metric results");
    let mut limiter = RateLimiter::new();
    for metric in registry.metrics().iter().copied() {
        loop {
            match registry.recompute_metric(metric, ctx, Some(base_time)).await {
                Ok(_) => break,
                Err(e) if is_rate_limit(&e) => {
                    tracing::error!(error = %e, "recompute rate-limited");
                    limiter.backoff().await?;
                }
                Err(e) if e.downcast_ref::<InsufficientData>().is_some() => {
                    tracing::warn!(
                        metric = metric.name(),
                        error = %e,
                        "skipping metric for this week"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        limiter.reset();
    }
    Ok(())
}

/// Compute metric results for each week going back one year, starting from
/// the earliest result already stored (or now, on a fresh store).
pub async fn compute_all(registry: &MetricRegistry, ctx: &MetricContext) -> anyhow::Result<()> {
    let one_year_ago = Utc::now() - chrono::Duration::days(BACKFILL_DAYS);
    tracing::info!(to = %one_year_ago.format("%Y-%m-%d"), "backfilling metric results");

    let earliest = ctx
        .store
        .earliest_metric_result_time(&registry.active_metrics())?
        .unwrap_or_else(Utc::now);

    let mut next = earliest - chrono::Duration::weeks(1);
    while next > one_year_ago {
        compute_week(registry, ctx, next).await?;
        next = next - chrono::Duration::weeks(1);
    }
    tracing::info!("finished backfilling metric results");
    Ok(())
}

/// A full backfill: scrape historical records for every target, then fill
/// in weekly metric results back to one year ago.
pub async fn run(
    providers: &Providers,
    registry: &MetricRegistry,
    ctx: &MetricContext,
) -> anyhow::Result<()> {
    scrape_all(providers, ctx, &ScrapeTarget::ALL).await?;
    compute_all(registry, ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::MetricKind;

    #[tokio::test]
    async fn backoff_doubles_until_the_ceiling_is_fatal() {
        let mut limiter =
            RateLimiter::with_policy(Duration::from_millis(1), Duration::from_millis(4));
        limiter.backoff().await.unwrap(); // 1ms
        limiter.backoff().await.unwrap(); // 2ms
        limiter.backoff().await.unwrap(); // 4ms
        let err = limiter.backoff().await.unwrap_err();
        assert!(err.to_string().contains("giving up"));

        limiter.reset();
        limiter.backoff().await.unwrap();
    }

    #[tokio::test]
    async fn compute_all_steps_back_one_week_at_a_time() {
        // Cherry-pick issue count never lacks data, so every weekly step
        // inside the year produces exactly one result.
        let registry = MetricRegistry::new(vec![MetricKind::CherrypickIssueCount]);
        let ctx = testutil::context(testutil::store());

        compute_all(&registry, &ctx).await.unwrap();
        assert_eq!(ctx.store.count_rows("metric_results").unwrap(), 52);
    }

    #[tokio::test]
    async fn compute_all_resumes_from_the_earliest_stored_result() {
        let registry = MetricRegistry::new(vec![MetricKind::CherrypickIssueCount]);
        let ctx = testutil::context(testutil::store());
        let start = Utc::now() - chrono::Duration::days(350);
        ctx.store
            .insert_metric_result("CherrypickIssueCountMetric", 0.0, start)
            .unwrap();

        compute_all(&registry, &ctx).await.unwrap();
        // Two more weekly steps fit between day 350 and one year ago.
        assert_eq!(ctx.store.count_rows("metric_results").unwrap(), 3);
    }

    #[tokio::test]
    async fn insufficient_data_does_not_abort_the_week() {
        // Flakiness has no data here, the issue count still lands.
        let registry = MetricRegistry::new(vec![
            MetricKind::BuildFlakiness,
            MetricKind::CherrypickIssueCount,
        ]);
        let ctx = testutil::context(testutil::store());
        compute_week(&registry, &ctx, testutil::base_time())
            .await
            .unwrap();
        assert_eq!(ctx.store.count_rows("metric_results").unwrap(), 1);
    }
}
