use super::default_lookback;
use crate::model::{Cherrypick, Release};
use crate::providers::github::GitHubGraphQL;
use crate::providers::ProviderError;
use crate::storage::store::Store;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(3);

/// Commits to inspect beyond a release tag's head. Cherry-picked releases
/// carry only a handful of commits past the merge-base.
const RELEASE_HISTORY_DEPTH: u32 = 20;

/// Release-driven scraper: instead of paging a single feed, it walks every
/// release whose cherry-picks have not been scraped yet and inspects the
/// commits on that release's tag.
pub struct CherrypickScraper {
    github: GitHubGraphQL,
    pub interval: Duration,
}

impl CherrypickScraper {
    pub fn new(github: GitHubGraphQL) -> Self {
        Self {
            github,
            interval: SCRAPE_INTERVAL,
        }
    }

    /// Commit hashes on the release tag that are not already known as
    /// branch commits or recorded cherry-picks.
    async fn scrape_release(
        &self,
        release: &Release,
        seen: &HashSet<String>,
    ) -> anyhow::Result<Vec<Cherrypick>> {
        tracing::info!(release = %release.name, "querying GitHub for commits in release");
        let data = self
            .github
            .query_repo(&format!(
                r#"release(tagName: "{}") {{
                     tag {{
                       target {{
                         ... on Commit {{
                           history(first: {RELEASE_HISTORY_DEPTH}) {{ nodes {{ oid }} }}
                         }}
                       }}
                     }}
                   }}"#,
                release.name
            ))
            .await?;

        let Some(commits) = data
            .pointer("/release/tag/target/history/nodes")
            .and_then(Value::as_array)
        else {
            // Lightweight tags and deleted refs have no commit history here.
            return Ok(Vec::new());
        };

        Ok(commits
            .iter()
            .filter_map(|c| c.get("oid").and_then(Value::as_str))
            .filter(|hash| !seen.contains(*hash))
            .map(|hash| Cherrypick {
                hash: hash.to_string(),
                release_id: release.id,
            })
            .collect())
    }

    /// Scrape cherry-picks for every pending release, oldest first,
    /// optionally bounded to a publish-time window. Each release's picks
    /// and its flag flip commit together; a release whose tag cannot be
    /// resolved is skipped and retried on the next run.
    pub async fn scrape_pending(
        &self,
        store: &Store,
        window: Option<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)>,
    ) -> anyhow::Result<usize> {
        let mut seen = store.known_commit_hashes()?;
        let releases = store.releases_pending_cherrypicks(window)?;
        tracing::info!(count = releases.len(), "scraping cherry-picks for releases");

        let mut total = 0;
        for release in &releases {
            match self.scrape_release(release, &seen).await {
                Ok(picks) => {
                    let saved = store.record_release_cherrypicks(release.id, &picks)?;
                    seen.extend(picks.iter().map(|p| p.hash.clone()));
                    total += saved;
                    tracing::info!(
                        release = %release.name,
                        cherrypicks = saved,
                        "scraped release"
                    );
                }
                Err(e) => match e.downcast_ref::<ProviderError>() {
                    Some(p) if !p.is_rate_limit() => {
                        tracing::warn!(release = %release.name, error = %p, "could not resolve release tag");
                    }
                    _ => return Err(e),
                },
            }
            tokio::time::sleep(self.interval).await;
        }
        Ok(total)
    }

    /// Scrape cherry-picks for releases published in the last 90 days.
    pub async fn scrape_recent(&self, store: &Store) -> anyhow::Result<usize> {
        let now = Utc::now();
        self.scrape_pending(store, Some((default_lookback(now), now)))
            .await
    }
}
