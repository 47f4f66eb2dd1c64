use super::{default_lookback, run_scrape, PageFetch, PageSource, ScrapeBounds, ScrapeSummary};
use crate::model::NewRelease;
use crate::providers::github::{self, GitHubGraphQL, PageInfo};
use crate::storage::store::Store;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(5);

pub struct ReleaseSource {
    github: GitHubGraphQL,
    pub interval: Duration,
}

impl ReleaseSource {
    pub fn new(github: GitHubGraphQL) -> Self {
        Self {
            github,
            interval: SCRAPE_INTERVAL,
        }
    }
}

#[async_trait]
impl PageSource for ReleaseSource {
    type Record = NewRelease;

    fn label(&self) -> &'static str {
        "releases"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn fetch_page(
        &self,
        _bounds: &ScrapeBounds,
        cursor: Option<&str>,
    ) -> anyhow::Result<PageFetch<NewRelease>> {
        let mut releases_args = format!("first: {}", github::MAX_PAGE_SIZE);
        if let Some(after) = cursor {
            releases_args.push_str(&format!(r#", after: "{after}""#));
        }
        tracing::debug!(%releases_args, "querying GitHub for releases");

        let data = self
            .github
            .query_repo(&format!(
                "releases({releases_args},
                          orderBy: {{field: CREATED_AT, direction: DESC}}) {{
                   pageInfo {{ endCursor hasNextPage }}
                   nodes {{ name publishedAt isDraft isPrerelease }}
                 }}"
            ))
            .await?;

        let releases = data.get("releases").context("releases missing from response")?;
        let page_info = PageInfo::from_value(
            releases
                .get("pageInfo")
                .context("releases missing pageInfo")?,
        )?;
        let Some(next_cursor) = page_info.end_cursor else {
            return Ok(PageFetch::Exhausted);
        };

        let nodes = releases
            .get("nodes")
            .and_then(Value::as_array)
            .context("releases missing nodes")?;
        let mut records = Vec::new();
        for node in nodes {
            let draft = node.get("isDraft").and_then(Value::as_bool).unwrap_or(false);
            let prerelease = node
                .get("isPrerelease")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let name = node.get("name").and_then(Value::as_str).unwrap_or_default();
            let published_at = node.get("publishedAt").and_then(Value::as_str);
            let (Some(published_at), false, false) = (published_at, draft, prerelease) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            records.push(NewRelease {
                published_at: github::parse_timestamp(published_at)?,
                name: name.to_string(),
            });
        }
        Ok(PageFetch::Page {
            records,
            next_cursor,
        })
    }

    fn persist(&self, store: &Store, record: &NewRelease) -> anyhow::Result<bool> {
        store.insert_release(record)
    }

    fn timestamp(record: &NewRelease) -> Option<DateTime<Utc>> {
        Some(record.published_at)
    }
}

/// Scrape releases newer than the latest one in the store; with an empty
/// store, the last 90 days of releases.
pub async fn scrape_since_latest(
    github: &GitHubGraphQL,
    store: &Store,
) -> anyhow::Result<ScrapeSummary> {
    let latest = store
        .latest_release_time()?
        .unwrap_or_else(|| default_lookback(Utc::now()));
    let bounds = ScrapeBounds {
        since: latest,
        until: None,
    };
    run_scrape(&ReleaseSource::new(github.clone()), store, bounds, latest).await
}

/// Scrape release history backwards until reaching `since`.
pub async fn scrape_historical(
    github: &GitHubGraphQL,
    store: &Store,
    since: DateTime<Utc>,
) -> anyhow::Result<ScrapeSummary> {
    let bounds = ScrapeBounds {
        since,
        until: store.oldest_release_time()?,
    };
    run_scrape(&ReleaseSource::new(github.clone()), store, bounds, since).await
}
