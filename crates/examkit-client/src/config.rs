//! Client configuration and factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examkit_core::engine::EngineConfig;

use crate::http::HttpExamClient;

/// Top-level examkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamkitConfig {
    /// Base URL of the exam backend. `${VAR}` references are expanded.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Deadline for fetching a question set, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Deadline for each submission attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub submit_timeout_secs: u64,
    /// Where graded sessions are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_server_url() -> String {
    "http://localhost:5000/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./examkit-results")
}

impl Default for ExamkitConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            fetch_timeout_secs: default_timeout_secs(),
            submit_timeout_secs: default_timeout_secs(),
            output_dir: default_output_dir(),
        }
    }
}

impl ExamkitConfig {
    /// Engine deadlines derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
            ..EngineConfig::default()
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examkit.toml` in the current directory
/// 2. `~/.config/examkit/config.toml`
///
/// `EXAMKIT_SERVER_URL` overrides the server URL from either file.
pub fn load_config() -> Result<ExamkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamkitConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examkit.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamkitConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamkitConfig::default(),
    };

    if let Ok(url) = std::env::var("EXAMKIT_SERVER_URL") {
        config.server_url = url;
    }
    config.server_url = resolve_env_vars(&config.server_url);

    if config.server_url.trim().is_empty() {
        anyhow::bail!("server_url is empty");
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examkit"))
}

/// Create an HTTP client for the configured backend.
pub fn create_client(config: &ExamkitConfig) -> Result<HttpExamClient> {
    let timeout = config.fetch_timeout_secs.max(config.submit_timeout_secs);
    HttpExamClient::new(&config.server_url, Some(Duration::from_secs(timeout)))
        .with_context(|| format!("failed to create client for {}", config.server_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMKIT_TEST_HOST", "exams.local");
        assert_eq!(
            resolve_env_vars("https://${_EXAMKIT_TEST_HOST}/api"),
            "https://exams.local/api"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        assert_eq!(resolve_env_vars("broken ${OPEN"), "broken ${OPEN");
        std::env::remove_var("_EXAMKIT_TEST_HOST");
    }

    #[test]
    fn default_config() {
        let config = ExamkitConfig::default();
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.submit_timeout_secs, 30);
        assert_eq!(config.engine_config().tick_period, Duration::from_secs(1));
    }

    #[test]
    fn parse_partial_config() {
        let config: ExamkitConfig = toml::from_str(
            r#"
server_url = "https://exams.example.com/api"
submit_timeout_secs = 45
"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "https://exams.example.com/api");
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.engine_config().submit_timeout, Duration::from_secs(45));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examkit.toml");
        std::fs::write(&path, "fetch_timeout_secs = 5\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.fetch_timeout_secs, 5);
        assert!(create_client(&config).is_ok());
    }
}
