use super::{default_lookback, run_scrape, PageFetch, PageSource, ScrapeBounds, ScrapeSummary};
use crate::model::CherrypickIssue;
use crate::providers::github::{self, GitHubGraphQL, PageInfo};
use crate::storage::store::Store;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(3);

/// Title prefix that marks an issue as a cherry-pick request.
const CHERRYPICK_TITLE_PATTERN: &str = r"(?i)cherry[ -]?pick request";

/// Pull request reference in a cherry-pick request title, e.g. "#12345".
const PULL_REQUEST_PATTERN: &str = r"#(\d+)";

pub struct CherrypickIssueSource {
    github: GitHubGraphQL,
    title_re: Regex,
    pull_request_re: Regex,
    pub interval: Duration,
}

impl CherrypickIssueSource {
    pub fn new(github: GitHubGraphQL) -> anyhow::Result<Self> {
        Ok(Self {
            github,
            title_re: Regex::new(CHERRYPICK_TITLE_PATTERN)?,
            pull_request_re: Regex::new(PULL_REQUEST_PATTERN)?,
            interval: SCRAPE_INTERVAL,
        })
    }
}

#[async_trait]
impl PageSource for CherrypickIssueSource {
    type Record = CherrypickIssue;

    fn label(&self) -> &'static str {
        "cherry-pick issues"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn fetch_page(
        &self,
        bounds: &ScrapeBounds,
        cursor: Option<&str>,
    ) -> anyhow::Result<PageFetch<CherrypickIssue>> {
        let mut paging_args = format!(
            r#"first: {}, filterBy: {{ since: "{}" }}"#,
            github::MAX_PAGE_SIZE,
            github::format_timestamp(&bounds.since)
        );
        if let Some(after) = cursor {
            paging_args.push_str(&format!(r#", after: "{after}""#));
        }
        tracing::debug!(%paging_args, "querying GitHub for issues");

        let data = self
            .github
            .query_repo(&format!(
                r#"issues(
                     orderBy: {{ direction: DESC, field: CREATED_AT }},
                     states: CLOSED,
                     labels: ["Type: Release"],
                     {paging_args}) {{
                   pageInfo {{ endCursor hasNextPage }}
                   nodes {{ number title createdAt }}
                 }}"#
            ))
            .await?;

        let issues = data.get("issues").context("issues missing from response")?;
        let page_info =
            PageInfo::from_value(issues.get("pageInfo").context("issues missing pageInfo")?)?;
        let Some(next_cursor) = page_info.end_cursor else {
            return Ok(PageFetch::Exhausted);
        };

        let nodes = issues
            .get("nodes")
            .and_then(Value::as_array)
            .context("issues missing nodes")?;
        let mut records = Vec::new();
        for node in nodes {
            let title = node.get("title").and_then(Value::as_str).unwrap_or_default();
            if !self.title_re.is_match(title) {
                continue;
            }
            let number = node
                .get("number")
                .and_then(Value::as_i64)
                .context("issue node missing number")?;
            let created_at = github::parse_timestamp(
                node.get("createdAt")
                    .and_then(Value::as_str)
                    .context("issue node missing createdAt")?,
            )?;
            let pull_request_number = self
                .pull_request_re
                .captures(title)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok());
            records.push(CherrypickIssue {
                number,
                created_at,
                pull_request_number,
            });
        }
        Ok(PageFetch::Page {
            records,
            next_cursor,
        })
    }

    fn persist(&self, store: &Store, record: &CherrypickIssue) -> anyhow::Result<bool> {
        store.insert_cherrypick_issue(record)
    }

    fn timestamp(record: &CherrypickIssue) -> Option<DateTime<Utc>> {
        Some(record.created_at)
    }
}

/// Scrape cherry-pick issues created since `since`.
pub async fn scrape_historical(
    github: &GitHubGraphQL,
    store: &Store,
    since: DateTime<Utc>,
) -> anyhow::Result<ScrapeSummary> {
    let bounds = ScrapeBounds { since, until: None };
    run_scrape(
        &CherrypickIssueSource::new(github.clone())?,
        store,
        bounds,
        since,
    )
    .await
}

/// Scrape cherry-pick issues newer than the latest one in the store; with
/// an empty store, the last 90 days of issues.
pub async fn scrape_since_latest(
    github: &GitHubGraphQL,
    store: &Store,
) -> anyhow::Result<ScrapeSummary> {
    let latest = store
        .latest_cherrypick_issue_time()?
        .unwrap_or_else(|| default_lookback(Utc::now()));
    scrape_historical(github, store, latest).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_pattern_accepts_request_variants() {
        let re = Regex::new(CHERRYPICK_TITLE_PATTERN).unwrap();
        assert!(re.is_match("Cherry-pick request for #31876"));
        assert!(re.is_match("cherry pick request: fix rollback"));
        assert!(re.is_match("🌸 Cherrypick request #100"));
        assert!(!re.is_match("Release 1.2.3 tracking"));
    }

    #[test]
    fn pull_request_number_is_captured_from_title() {
        let re = Regex::new(PULL_REQUEST_PATTERN).unwrap();
        let number: i64 = re
            .captures("Cherry-pick request for #31876 into release")
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap();
        assert_eq!(number, 31876);
        assert!(re.captures("Cherry-pick request, no ref").is_none());
    }
}
