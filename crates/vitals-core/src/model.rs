use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// A status state for a pull request.
///
/// See https://docs.github.com/graphql/reference/enums#statusstate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestStatus {
    Unknown,
    Error,
    Expected,
    Failure,
    Pending,
    Success,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestStatus::Unknown => "unknown",
            PullRequestStatus::Error => "error",
            PullRequestStatus::Expected => "expected",
            PullRequestStatus::Failure => "failure",
            PullRequestStatus::Pending => "pending",
            PullRequestStatus::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "unknown" => Ok(PullRequestStatus::Unknown),
            "error" => Ok(PullRequestStatus::Error),
            "expected" => Ok(PullRequestStatus::Expected),
            "failure" => Ok(PullRequestStatus::Failure),
            "pending" => Ok(PullRequestStatus::Pending),
            "success" => Ok(PullRequestStatus::Success),
            other => Err(ParseEnumError {
                kind: "pull request status",
                value: other.to_string(),
            }),
        }
    }
}

/// A commit on the default branch of the repo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub committed_at: DateTime<Utc>,
    pub pull_request: Option<i64>,
    pub pull_request_status: PullRequestStatus,
}

/// Lifecycle state of a CI build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Created,
    Received,
    Started,
    Passed,
    Failed,
    Errored,
    Canceled,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Created => "created",
            BuildState::Received => "received",
            BuildState::Started => "started",
            BuildState::Passed => "passed",
            BuildState::Failed => "failed",
            BuildState::Errored => "errored",
            BuildState::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "created" => Ok(BuildState::Created),
            "received" => Ok(BuildState::Received),
            "started" => Ok(BuildState::Started),
            "passed" => Ok(BuildState::Passed),
            "failed" => Ok(BuildState::Failed),
            "errored" => Ok(BuildState::Errored),
            "canceled" => Ok(BuildState::Canceled),
            other => Err(ParseEnumError {
                kind: "build state",
                value: other.to_string(),
            }),
        }
    }

    /// States that ran to completion and carry a meaningful pass/fail signal.
    pub const TERMINAL: [BuildState; 3] =
        [BuildState::Passed, BuildState::Failed, BuildState::Errored];
}

/// A CI build of a pull request against the default branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub number: i64,
    /// Wall-clock duration in seconds; unset for non-terminal states.
    pub duration: Option<f64>,
    pub state: BuildState,
    pub started_at: Option<DateTime<Utc>>,
    pub commit_hash: Option<String>,
}

/// A production release cut, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub published_at: DateTime<Utc>,
    pub name: String,
    pub scraped_cherrypicks: bool,
}

/// A release as produced by the release scraper, before the store assigns
/// its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelease {
    pub published_at: DateTime<Utc>,
    pub name: String,
}

/// A commit cherry-picked into a release beyond its merge-base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cherrypick {
    pub hash: String,
    pub release_id: i64,
}

/// A cherry-pick tracking issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CherrypickIssue {
    pub number: i64,
    pub created_at: DateTime<Utc>,
    /// Pull request number named in the issue title, when one is present.
    pub pull_request_number: Option<i64>,
}

/// A value computed for a single metric. Rows are append-only; the value's
/// meaning (percentage, seconds, count) is owned by the metric itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    pub id: i64,
    pub name: String,
    pub value: f64,
    pub computed_at: DateTime<Utc>,
}

/// Aggregate duration figures for a CI workflow over a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDurationMetrics {
    pub min: i64,
    pub mean: i64,
    pub median: i64,
    pub p95: i64,
    pub max: i64,
    pub standard_deviation: f64,
    pub total_duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub duration_metrics: WorkflowDurationMetrics,
    pub total_runs: i64,
    pub successful_runs: i64,
    pub failed_runs: i64,
    pub mttr: i64,
    pub total_credits_used: i64,
    pub median_credits_used: i64,
    pub success_rate: f64,
    pub total_recoveries: i64,
    pub throughput: f64,
}

/// Workflow aggregates returned by the CI insights API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub project_id: String,
    pub name: String,
    pub metrics: WorkflowMetrics,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Coverage figure for one commit, as reported by the coverage provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageValue {
    pub commit_hash: String,
    /// Covered-line percentage in the range [0, 100].
    pub percentage: f64,
}
