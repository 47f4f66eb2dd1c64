use thiserror::Error;

pub mod circleci;
pub mod codecov;
pub mod github;

/// A failed provider request. The HTTP status and the provider's own
/// message are preserved for the caller.
#[derive(Debug, Error)]
#[error("{provider} API error (HTTP {status_code}): {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            provider,
            status_code,
            message: message.into(),
        }
    }

    /// Whether the provider is telling us to slow down. GitHub reports
    /// GraphQL rate limits as HTTP 403 with a RATE_LIMITED error type.
    pub fn is_rate_limit(&self) -> bool {
        self.status_code == 429
            || self.message.contains("RATE_LIMITED")
            || (self.status_code == 403 && self.message.to_ascii_lowercase().contains("rate limit"))
    }
}

/// The full set of provider clients the scrapers and metrics draw from.
#[derive(Clone)]
pub struct Providers {
    pub github: github::GitHubGraphQL,
    pub circleci: circleci::CircleCiApi,
    pub codecov: codecov::CodecovApi,
}

impl Providers {
    pub fn from_config(cfg: &crate::config::VitalsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            github: github::GitHubGraphQL::new(
                &cfg.github.repo,
                cfg.github.token.clone().unwrap_or_default(),
            )?,
            circleci: circleci::CircleCiApi::new(
                &cfg.github.repo,
                cfg.circleci.token.clone().unwrap_or_default(),
            ),
            codecov: codecov::CodecovApi::new(
                &cfg.github.repo,
                cfg.codecov.token.clone().unwrap_or_default(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(ProviderError::new("CircleCI", 429, "slow down").is_rate_limit());
        assert!(ProviderError::new("GitHub", 403, "API rate limit exceeded").is_rate_limit());
        assert!(ProviderError::new("GitHub", 200, "RATE_LIMITED: wait").is_rate_limit());
        assert!(!ProviderError::new("GitHub", 403, "forbidden").is_rate_limit());
        assert!(!ProviderError::new("Codecov", 500, "oops").is_rate_limit());
    }
}
