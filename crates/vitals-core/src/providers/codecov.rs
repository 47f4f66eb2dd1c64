use super::ProviderError;
use crate::model::CoverageValue;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

const API_ROOT: &str = "https://codecov.io/api/gh";

/// Live coverage lookups. Kept behind a trait so metric computations can be
/// exercised against a stub.
#[async_trait]
pub trait CoverageProvider: Send + Sync {
    async fn absolute_coverage(&self, commit_hash: &str) -> anyhow::Result<CoverageValue>;
}

/// Client for the Codecov API.
#[derive(Clone)]
pub struct CodecovApi {
    client: reqwest::Client,
    repo: String,
    token: String,
}

impl CodecovApi {
    pub fn new(repo: &str, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            repo: repo.to_string(),
            token,
        }
    }
}

#[async_trait]
impl CoverageProvider for CodecovApi {
    /// Fetch the absolute coverage recorded for one commit, as a percentage
    /// in [0, 100].
    async fn absolute_coverage(&self, commit_hash: &str) -> anyhow::Result<CoverageValue> {
        let url = format!("{API_ROOT}/{}/commit/{commit_hash}", self.repo);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "vitals/0.4")
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        if status != 200 {
            let message = body
                .pointer("/error/reason")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error");
            return Err(ProviderError::new("Codecov", status, message).into());
        }

        let totals = body
            .pointer("/commit/totals/c")
            .context("coverage response missing commit totals")?;
        let percentage = match totals {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
        .context("coverage total is not numeric")?;

        Ok(CoverageValue {
            commit_hash: commit_hash.to_string(),
            percentage,
        })
    }
}
