use super::ProviderError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub const GRAPHQL_API_URI: &str = "https://api.github.com/graphql";

/// Maximum page size accepted by the GraphQL connections we query.
pub const MAX_PAGE_SIZE: u32 = 100;

/// The GitHub API's fixed timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|n| n.and_utc())
        .with_context(|| format!("invalid GitHub timestamp: {s}"))
}

pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Paging info attached to every GraphQL connection we request.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
    #[serde(rename = "hasNextPage", default)]
    pub has_next_page: bool,
}

impl PageInfo {
    pub fn from_value(v: &Value) -> anyhow::Result<Self> {
        serde_json::from_value(v.clone()).context("malformed pageInfo in GraphQL response")
    }
}

/// Client for executing GraphQL queries against the GitHub API v4.
///
/// For an overview of the API see https://docs.github.com/graphql.
#[derive(Clone)]
pub struct GitHubGraphQL {
    client: reqwest::Client,
    repo_owner: String,
    repo_name: String,
    token: String,
}

impl GitHubGraphQL {
    pub fn new(repo: &str, token: String) -> anyhow::Result<Self> {
        let (owner, name) = repo
            .split_once('/')
            .with_context(|| format!("repository must be owner/name, got: {repo}"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            repo_owner: owner.to_string(),
            repo_name: name.to_string(),
            token,
        })
    }

    async fn execute(&self, payload: Value) -> anyhow::Result<Value> {
        tracing::debug!("sending GitHub GraphQL query");
        let resp = self
            .client
            .post(GRAPHQL_API_URI)
            .header("Authorization", format!("bearer {}", self.token))
            .header("User-Agent", "vitals/0.4")
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::new("GitHub", status, body).into());
        }

        let body: Value = resp.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            let first = errors.first().cloned().unwrap_or(Value::Null);
            let kind = first
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let message = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified GraphQL error");
            tracing::error!(%kind, %message, "GitHub GraphQL API returned an error response");
            return Err(ProviderError::new(
                "GitHub",
                status,
                format!("{kind}: {message}"),
            )
            .into());
        }

        body.get("data")
            .cloned()
            .context("GraphQL response missing data")
    }

    /// Execute a non-mutation query against the API.
    pub async fn query(&self, graphql: &str) -> anyhow::Result<Value> {
        self.execute(json!({ "query": format!("query {{{graphql}}}") }))
            .await
    }

    /// Execute a non-mutation query scoped to the configured repository.
    pub async fn query_repo(&self, graphql: &str) -> anyhow::Result<Value> {
        let wrapped = format!(
            r#"repository(owner: "{}", name: "{}") {{ {} }}"#,
            self.repo_owner, self.repo_name, graphql
        );
        let data = self.query(&wrapped).await?;
        data.get("repository")
            .cloned()
            .context("GraphQL response missing repository")
    }

    /// Execute a non-mutation query scoped to the repository's default branch.
    pub async fn query_default_branch(&self, graphql: &str) -> anyhow::Result<Value> {
        let wrapped = format!("defaultBranchRef {{ {graphql} }}");
        let data = self.query_repo(&wrapped).await?;
        data.get("defaultBranchRef")
            .cloned()
            .context("GraphQL response missing defaultBranchRef")
    }
}
