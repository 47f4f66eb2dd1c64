use super::{default_lookback, run_scrape, PageFetch, PageSource, ScrapeBounds, ScrapeSummary};
use crate::model::{Commit, PullRequestStatus};
use crate::providers::github::{self, GitHubGraphQL, PageInfo};
use crate::storage::store::Store;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(5);

pub struct CommitSource {
    github: GitHubGraphQL,
    pub interval: Duration,
}

impl CommitSource {
    pub fn new(github: GitHubGraphQL) -> Self {
        Self {
            github,
            interval: SCRAPE_INTERVAL,
        }
    }
}

#[async_trait]
impl PageSource for CommitSource {
    type Record = Commit;

    fn label(&self) -> &'static str {
        "commits"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn fetch_page(
        &self,
        bounds: &ScrapeBounds,
        cursor: Option<&str>,
    ) -> anyhow::Result<PageFetch<Commit>> {
        let mut history_args = format!(
            r#"since: "{}""#,
            github::format_timestamp(&bounds.since)
        );
        if let Some(until) = bounds.until {
            history_args.push_str(&format!(r#", until: "{}""#, github::format_timestamp(&until)));
        }
        if let Some(after) = cursor {
            history_args.push_str(&format!(r#", after: "{after}""#));
        }
        tracing::debug!(%history_args, "querying GitHub for commits");

        let data = self
            .github
            .query_default_branch(&format!(
                "target {{ ... on Commit {{
                   history(first: {page_size}, {history_args}) {{
                     pageInfo {{ endCursor hasNextPage }}
                     nodes {{
                       oid
                       committedDate
                       associatedPullRequests(first: 1) {{ nodes {{ number }} }}
                     }}
                   }}
                 }} }}",
                page_size = github::MAX_PAGE_SIZE,
            ))
            .await?;

        let history = data
            .pointer("/target/history")
            .context("commit history missing from response")?;
        let page_info = PageInfo::from_value(
            history
                .get("pageInfo")
                .context("commit history missing pageInfo")?,
        )?;
        let Some(next_cursor) = page_info.end_cursor else {
            return Ok(PageFetch::Exhausted);
        };

        let nodes = history
            .pointer("/nodes")
            .and_then(Value::as_array)
            .context("commit history missing nodes")?;
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            let oid = node
                .get("oid")
                .and_then(Value::as_str)
                .context("commit node missing oid")?;
            let committed_at = github::parse_timestamp(
                node.get("committedDate")
                    .and_then(Value::as_str)
                    .context("commit node missing committedDate")?,
            )?;
            let pull_request = node
                .pointer("/associatedPullRequests/nodes/0/number")
                .and_then(Value::as_i64);
            if pull_request.is_none() {
                tracing::debug!(hash = &oid[..7.min(oid.len())], "no pull request for commit");
            }
            records.push(Commit {
                hash: oid.to_string(),
                committed_at,
                pull_request,
                pull_request_status: PullRequestStatus::Unknown,
            });
        }
        Ok(PageFetch::Page {
            records,
            next_cursor,
        })
    }

    fn persist(&self, store: &Store, record: &Commit) -> anyhow::Result<bool> {
        store.insert_commit(record)
    }

    fn timestamp(record: &Commit) -> Option<DateTime<Utc>> {
        Some(record.committed_at)
    }
}

/// Scrape commits newer than the latest one in the store. With an empty
/// store this reaches back the default lookback instead of the repo's
/// entire history.
pub async fn scrape_since_latest(
    github: &GitHubGraphQL,
    store: &Store,
) -> anyhow::Result<ScrapeSummary> {
    let latest = store
        .latest_commit_time()?
        .unwrap_or_else(|| default_lookback(Utc::now()));
    let bounds = ScrapeBounds {
        since: latest,
        until: None,
    };
    run_scrape(&CommitSource::new(github.clone()), store, bounds, latest).await
}

/// Scrape commit history backwards from the oldest stored commit to `since`.
pub async fn scrape_historical(
    github: &GitHubGraphQL,
    store: &Store,
    since: DateTime<Utc>,
) -> anyhow::Result<ScrapeSummary> {
    let until = store.oldest_commit_time()?.unwrap_or_else(Utc::now);
    let bounds = ScrapeBounds {
        since,
        until: Some(until),
    };
    run_scrape(&CommitSource::new(github.clone()), store, bounds, since).await
}
