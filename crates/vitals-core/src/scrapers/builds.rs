use super::{default_lookback, run_scrape, PageFetch, PageSource, ScrapeBounds, ScrapeSummary};
use crate::model::Build;
use crate::providers::circleci::CircleCiApi;
use crate::storage::store::Store;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(2);

pub struct BuildSource {
    ci: CircleCiApi,
    pub interval: Duration,
}

impl BuildSource {
    pub fn new(ci: CircleCiApi) -> Self {
        Self {
            ci,
            interval: SCRAPE_INTERVAL,
        }
    }
}

#[async_trait]
impl PageSource for BuildSource {
    type Record = Build;

    fn label(&self) -> &'static str {
        "builds"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    /// The builds endpoint pages by offset rather than an opaque token, so
    /// the cursor carries the next page number. The query itself is not
    /// time-bounded; the driver's floor ends the loop.
    async fn fetch_page(
        &self,
        _bounds: &ScrapeBounds,
        cursor: Option<&str>,
    ) -> anyhow::Result<PageFetch<Build>> {
        let page: u32 = cursor
            .map(|c| c.parse().context("malformed builds page cursor"))
            .transpose()?
            .unwrap_or(0);
        let records = self.ci.fetch_builds(page).await?;
        if records.is_empty() {
            return Ok(PageFetch::Exhausted);
        }
        Ok(PageFetch::Page {
            records,
            next_cursor: (page + 1).to_string(),
        })
    }

    fn persist(&self, store: &Store, record: &Build) -> anyhow::Result<bool> {
        store.insert_build(record)
    }

    fn timestamp(record: &Build) -> Option<DateTime<Utc>> {
        record.started_at
    }
}

/// Scrape builds newer than the latest one in the store; with an empty
/// store, the last 90 days of builds.
pub async fn scrape_since_latest(
    ci: &CircleCiApi,
    store: &Store,
) -> anyhow::Result<ScrapeSummary> {
    let latest = store
        .latest_build_time()?
        .unwrap_or_else(|| default_lookback(Utc::now()));
    let bounds = ScrapeBounds {
        since: latest,
        until: None,
    };
    run_scrape(&BuildSource::new(ci.clone()), store, bounds, latest).await
}

/// Scrape builds backwards until reaching `since`.
pub async fn scrape_historical(
    ci: &CircleCiApi,
    store: &Store,
    since: DateTime<Utc>,
) -> anyhow::Result<ScrapeSummary> {
    let bounds = ScrapeBounds {
        since,
        until: store.oldest_build_time()?,
    };
    run_scrape(&BuildSource::new(ci.clone()), store, bounds, since).await
}
