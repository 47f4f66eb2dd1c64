use super::ProviderError;
use crate::model::{Build, BuildState, WorkflowStats};
use anyhow::Context;
use serde_json::Value;

const API_ROOT: &str = "https://circleci.com/api";

/// Page size of the recent-builds endpoint.
pub const BUILDS_PAGE_SIZE: u32 = 25;

/// The reporting windows supported by the insights API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingWindow {
    Last24Hours,
    Last7Days,
    Last30Days,
    Last60Days,
    Last90Days,
}

impl ReportingWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingWindow::Last24Hours => "last-24-hours",
            ReportingWindow::Last7Days => "last-7-days",
            ReportingWindow::Last30Days => "last-30-days",
            ReportingWindow::Last60Days => "last-60-days",
            ReportingWindow::Last90Days => "last-90-days",
        }
    }
}

/// Client for the CircleCI REST API.
///
/// For an overview of the API see https://circleci.com/docs/api/v2/.
#[derive(Clone)]
pub struct CircleCiApi {
    client: reqwest::Client,
    /// vcs-qualified project slug, e.g. `github/owner/name`.
    project_slug: String,
    token: String,
}

impl CircleCiApi {
    pub fn new(repo: &str, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_slug: format!("github/{repo}"),
            token,
        }
    }

    /// Fetch one page of recent default-branch pull-request builds, newest
    /// first. Provider build records are normalized onto [`Build`]; rows in
    /// states that carry no health signal are dropped.
    pub async fn fetch_builds(&self, page: u32) -> anyhow::Result<Vec<Build>> {
        let url = format!("{API_ROOT}/v1.1/project/{}", self.project_slug);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("limit", BUILDS_PAGE_SIZE.to_string()),
                ("offset", (page * BUILDS_PAGE_SIZE).to_string()),
                ("shallow", "true".to_string()),
            ])
            .header("Circle-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::new("CircleCI", status, body).into());
        }

        let rows: Vec<Value> = resp.json().await?;
        let mut builds = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(build) = build_from_json(row)? {
                builds.push(build);
            }
        }
        Ok(builds)
    }

    /// Workflow aggregates for the configured project over a reporting
    /// window.
    pub async fn get_workflow_stats(
        &self,
        window: ReportingWindow,
    ) -> anyhow::Result<WorkflowStats> {
        let url = format!("{API_ROOT}/v2/insights/{}/workflows", self.project_slug);
        tracing::info!(%url, window = window.as_str(), "querying workflow insights");
        let resp = self
            .client
            .get(&url)
            .query(&[("reporting-window", window.as_str())])
            .header("Circle-Token", &self.token)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        if status != 200 {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error");
            return Err(ProviderError::new("CircleCI", status, message).into());
        }

        let item = body
            .pointer("/items/0")
            .context("insights response contains no workflow items")?;
        serde_json::from_value(item.clone()).context("malformed workflow stats payload")
    }
}

fn build_from_json(v: &Value) -> anyhow::Result<Option<Build>> {
    let Some(state) = v
        .get("status")
        .and_then(Value::as_str)
        .and_then(normalize_state)
    else {
        tracing::debug!(status = ?v.get("status"), "skipping build in unmapped state");
        return Ok(None);
    };

    let number = v
        .get("build_num")
        .and_then(Value::as_i64)
        .context("build record missing build_num")?;
    let started_at = v
        .get("start_time")
        .and_then(Value::as_str)
        .map(parse_build_time)
        .transpose()?;
    Ok(Some(Build {
        id: number,
        number,
        duration: v
            .get("build_time_millis")
            .and_then(Value::as_f64)
            .map(|ms| ms / 1000.0),
        state,
        started_at,
        commit_hash: v
            .get("vcs_revision")
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

fn parse_build_time(s: &str) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&chrono::Utc))
        .with_context(|| format!("invalid build start time: {s}"))
}

fn normalize_state(status: &str) -> Option<BuildState> {
    match status {
        "scheduled" => Some(BuildState::Created),
        "queued" | "not_running" => Some(BuildState::Received),
        "running" => Some(BuildState::Started),
        "success" | "fixed" => Some(BuildState::Passed),
        "failed" => Some(BuildState::Failed),
        "infrastructure_fail" | "timedout" => Some(BuildState::Errored),
        "canceled" => Some(BuildState::Canceled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_provider_states() {
        assert_eq!(normalize_state("success"), Some(BuildState::Passed));
        assert_eq!(normalize_state("fixed"), Some(BuildState::Passed));
        assert_eq!(normalize_state("timedout"), Some(BuildState::Errored));
        assert_eq!(normalize_state("canceled"), Some(BuildState::Canceled));
        assert_eq!(normalize_state("no_tests"), None);
    }

    #[test]
    fn maps_build_payload_fields() {
        let build = build_from_json(&json!({
            "build_num": 812,
            "status": "failed",
            "build_time_millis": 93500,
            "start_time": "2025-05-01T10:20:30.000Z",
            "vcs_revision": "0f0f0f"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(build.id, 812);
        assert_eq!(build.state, BuildState::Failed);
        assert_eq!(build.duration, Some(93.5));
        assert_eq!(build.commit_hash.as_deref(), Some("0f0f0f"));
        assert!(build.started_at.is_some());
    }

    #[test]
    fn drops_unmapped_states_without_failing() {
        let parsed = build_from_json(&json!({
            "build_num": 1,
            "status": "retried"
        }))
        .unwrap();
        assert!(parsed.is_none());
    }
}
