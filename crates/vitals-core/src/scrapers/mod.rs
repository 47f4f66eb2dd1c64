use crate::providers::Providers;
use crate::storage::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

pub mod builds;
pub mod cherrypick_issues;
pub mod cherrypicks;
pub mod commits;
pub mod releases;

/// How far back an incremental scrape reaches when the store is empty.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;

pub fn default_lookback(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS)
}

/// Result of fetching one page from a provider. `Exhausted` is the normal
/// end of pagination, not an error.
#[derive(Debug)]
pub enum PageFetch<T> {
    Page {
        records: Vec<T>,
        next_cursor: String,
    },
    Exhausted,
}

/// Time bounds passed through to the provider query. `until` is only
/// meaningful for providers whose query language supports an upper bound.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeBounds {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

/// One paginated record stream: the provider call, the record mapper, and
/// the store writer for a single record type.
#[async_trait]
pub trait PageSource {
    type Record: Send + Sync;

    /// Record type name, for logs.
    fn label(&self) -> &'static str;

    /// Pause between page requests, as rate-limit courtesy.
    fn interval(&self) -> Duration;

    /// Fetch one page, newest first. The returned cursor resumes the next
    /// page; a page is finite and not restartable.
    async fn fetch_page(
        &self,
        bounds: &ScrapeBounds,
        cursor: Option<&str>,
    ) -> anyhow::Result<PageFetch<Self::Record>>;

    /// Persist one record; `false` means the record hit the duplicate or
    /// integrity skip path.
    fn persist(&self, store: &Store, record: &Self::Record) -> anyhow::Result<bool>;

    /// Timestamp used to track scrape progress, when the record has one.
    fn timestamp(record: &Self::Record) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub pages: u32,
    pub saved: usize,
    pub skipped: usize,
}

/// The shared pagination loop. The `(cursor, last_seen)` pair is threaded
/// through each step explicitly; every record is persisted in its own
/// transaction, so one bad record never aborts a page. The loop ends when
/// the provider reports exhaustion or when the last record timestamp seen
/// crosses `floor` (the high-water mark for incremental scrapes, the
/// requested lower bound for historical ones).
pub async fn run_scrape<S: PageSource>(
    source: &S,
    store: &Store,
    bounds: ScrapeBounds,
    floor: DateTime<Utc>,
) -> anyhow::Result<ScrapeSummary> {
    let mut cursor: Option<String> = None;
    let mut last_seen: Option<DateTime<Utc>> = None;
    let mut summary = ScrapeSummary::default();

    loop {
        tracing::info!(page = summary.pages + 1, "fetching page of {}", source.label());
        let (records, next_cursor) = match source.fetch_page(&bounds, cursor.as_deref()).await? {
            PageFetch::Exhausted => {
                tracing::info!(
                    pages = summary.pages,
                    "no further {} available",
                    source.label()
                );
                break;
            }
            PageFetch::Page {
                records,
                next_cursor,
            } => (records, next_cursor),
        };

        for record in &records {
            if source.persist(store, record)? {
                summary.saved += 1;
            } else {
                summary.skipped += 1;
            }
            if let Some(ts) = S::timestamp(record) {
                last_seen = Some(ts);
            }
        }
        summary.pages += 1;
        cursor = Some(next_cursor);
        tracing::info!(
            saved = summary.saved,
            skipped = summary.skipped,
            "scraped {} records of {}",
            records.len(),
            source.label()
        );

        if matches!(last_seen, Some(ts) if ts < floor) {
            break;
        }
        tokio::time::sleep(source.interval()).await;
    }

    Ok(summary)
}

/// The record types the scraping pipeline covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeTarget {
    Commits,
    Builds,
    Releases,
    Cherrypicks,
    CherrypickIssues,
}

impl ScrapeTarget {
    pub const ALL: [ScrapeTarget; 5] = [
        ScrapeTarget::Commits,
        ScrapeTarget::Builds,
        ScrapeTarget::Releases,
        ScrapeTarget::Cherrypicks,
        ScrapeTarget::CherrypickIssues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeTarget::Commits => "commits",
            ScrapeTarget::Builds => "builds",
            ScrapeTarget::Releases => "releases",
            ScrapeTarget::Cherrypicks => "cherrypicks",
            ScrapeTarget::CherrypickIssues => "cherrypick-issues",
        }
    }
}

impl FromStr for ScrapeTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commits" => Ok(ScrapeTarget::Commits),
            "builds" => Ok(ScrapeTarget::Builds),
            "releases" => Ok(ScrapeTarget::Releases),
            "cherrypicks" => Ok(ScrapeTarget::Cherrypicks),
            "cherrypick-issues" => Ok(ScrapeTarget::CherrypickIssues),
            other => anyhow::bail!("unknown scrape target: {other}"),
        }
    }
}

/// Incrementally scrape one record type since the latest stored record.
pub async fn scrape_since_latest(
    target: ScrapeTarget,
    providers: &Providers,
    store: &Store,
) -> anyhow::Result<()> {
    match target {
        ScrapeTarget::Commits => {
            commits::scrape_since_latest(&providers.github, store).await?;
        }
        ScrapeTarget::Builds => {
            builds::scrape_since_latest(&providers.circleci, store).await?;
        }
        ScrapeTarget::Releases => {
            releases::scrape_since_latest(&providers.github, store).await?;
        }
        ScrapeTarget::Cherrypicks => {
            cherrypicks::CherrypickScraper::new(providers.github.clone())
                .scrape_recent(store)
                .await?;
        }
        ScrapeTarget::CherrypickIssues => {
            cherrypick_issues::scrape_since_latest(&providers.github, store).await?;
        }
    }
    Ok(())
}

/// Historically scrape one record type back to `since`.
pub async fn scrape_historical(
    target: ScrapeTarget,
    providers: &Providers,
    store: &Store,
    since: DateTime<Utc>,
) -> anyhow::Result<()> {
    match target {
        ScrapeTarget::Commits => {
            commits::scrape_historical(&providers.github, store, since).await?;
        }
        ScrapeTarget::Builds => {
            builds::scrape_historical(&providers.circleci, store, since).await?;
        }
        ScrapeTarget::Releases => {
            releases::scrape_historical(&providers.github, store, since).await?;
        }
        ScrapeTarget::Cherrypicks => {
            // Release-driven; covers every pending release regardless of age.
            cherrypicks::CherrypickScraper::new(providers.github.clone())
                .scrape_pending(store, None)
                .await?;
        }
        ScrapeTarget::CherrypickIssues => {
            cherrypick_issues::scrape_historical(&providers.github, store, since).await?;
        }
    }
    Ok(())
}
