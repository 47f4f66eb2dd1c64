use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircleCiConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodecovConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VitalsConfig {
    pub github: GitHubConfig,
    #[serde(default)]
    pub circleci: CircleCiConfig,
    #[serde(default)]
    pub codecov: CodecovConfig,
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_database() -> PathBuf {
    PathBuf::from("vitals.db")
}

/// Load configuration from a YAML file. API tokens may instead come from
/// the environment (`VITALS_GITHUB_TOKEN`, `VITALS_CIRCLECI_TOKEN`,
/// `VITALS_CODECOV_TOKEN`), which takes precedence over the file.
pub fn load_config(path: &Path) -> Result<VitalsConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let mut cfg: VitalsConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if let Ok(token) = std::env::var("VITALS_GITHUB_TOKEN") {
        cfg.github.token = Some(token);
    }
    if let Ok(token) = std::env::var("VITALS_CIRCLECI_TOKEN") {
        cfg.circleci.token = Some(token);
    }
    if let Ok(token) = std::env::var("VITALS_CODECOV_TOKEN") {
        cfg.codecov.token = Some(token);
    }

    if !cfg.github.repo.contains('/') {
        return Err(ConfigError(format!(
            "github.repo must be owner/name, got: {}",
            cfg.github.repo
        )));
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.yaml");
        std::fs::write(&path, "github:\n  repo: acme/widgets\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.github.repo, "acme/widgets");
        assert_eq!(cfg.database, PathBuf::from("vitals.db"));
        assert!(cfg.circleci.token.is_none());
    }

    #[test]
    fn rejects_malformed_repo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.yaml");
        std::fs::write(&path, "github:\n  repo: widgets\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
