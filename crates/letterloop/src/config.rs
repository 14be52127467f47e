//! Project configuration file support for letterloop.
//!
//! Loads configuration from `letterloop.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use letterloop_client::ClientSettings;
use letterloop_core::LoopSettings;
use letterloop_critic::{RubricSpec, TotalStrategy};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "letterloop.toml";

/// Default rules document, relative to the working directory
pub const DEFAULT_RULES_FILE: &str = "Rules.txt";

/// Default credentials file, relative to the working directory
pub const DEFAULT_KEY_FILE: &str = "API_KEY.txt";

/// Project-level configuration loaded from `letterloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default, rename = "loop")]
    pub run: LoopConfig,
    #[serde(default)]
    pub rubric: RubricConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Generative service settings
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Overrides the model named in the key file
    pub model: Option<String>,
    pub lite_model: Option<String>,
    pub endpoint: Option<String>,
    /// Physical attempts per call
    pub max_attempts: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub backoff_base: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    pub threshold: Option<u32>,
    pub max_attempts: Option<usize>,
    pub stall_limit: Option<usize>,
    pub total_strategy: Option<TotalStrategy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RubricConfig {
    pub criteria: Option<usize>,
    pub weight: Option<u32>,
}

/// File locations; relative paths resolve against the working directory
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub rules: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    /// JSONL copy of the run events shown on the console
    pub event_log: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    pub fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::default();
        if let Some(ref endpoint) = self.api.endpoint {
            settings = settings.with_endpoint(endpoint.as_str());
        }
        if let Some(ref lite) = self.api.lite_model {
            settings = settings.with_lite_model(lite.as_str());
        }
        if let Some(attempts) = self.api.max_attempts {
            settings = settings.with_max_attempts(attempts);
        }
        if let Some(base) = self.api.backoff_base {
            settings = settings.with_backoff_base(base);
        }
        if let Some(timeout) = self.api.request_timeout {
            settings = settings.with_request_timeout(timeout);
        }
        settings
    }

    /// Loop settings. CLI values take priority over the file.
    pub fn loop_settings(
        &self,
        max_attempts: Option<usize>,
        threshold: Option<u32>,
        stall_limit: Option<usize>,
    ) -> LoopSettings {
        let defaults = LoopSettings::default();
        LoopSettings {
            threshold: threshold
                .or(self.run.threshold)
                .unwrap_or(defaults.threshold),
            max_attempts: max_attempts.or(self.run.max_attempts),
            stall_limit: stall_limit.or(self.run.stall_limit),
        }
    }

    pub fn rubric_spec(&self) -> RubricSpec {
        let defaults = RubricSpec::default();
        RubricSpec {
            criteria: self.rubric.criteria.unwrap_or(defaults.criteria),
            weight: self.rubric.weight.unwrap_or(defaults.weight),
        }
    }

    pub fn total_strategy(&self, cli: Option<TotalStrategy>) -> TotalStrategy {
        cli.or(self.run.total_strategy).unwrap_or_default()
    }

    /// Rules path. Priority: CLI > [paths].rules > Rules.txt
    pub fn rules_path(&self, working_dir: &Path, cli: Option<&Path>) -> PathBuf {
        resolve(
            working_dir,
            cli.or(self.paths.rules.as_deref())
                .unwrap_or(Path::new(DEFAULT_RULES_FILE)),
        )
    }

    /// Key file path. Priority: CLI > [paths].key_file > API_KEY.txt
    pub fn key_file_path(&self, working_dir: &Path, cli: Option<&Path>) -> PathBuf {
        resolve(
            working_dir,
            cli.or(self.paths.key_file.as_deref())
                .unwrap_or(Path::new(DEFAULT_KEY_FILE)),
        )
    }

    /// Database path, or None for the default per-user location
    pub fn database_path(&self, working_dir: &Path, cli: Option<&Path>) -> Option<PathBuf> {
        cli.or(self.paths.database.as_deref())
            .map(|p| resolve(working_dir, p))
    }

    pub fn log_file_path(&self, working_dir: &Path) -> Option<PathBuf> {
        self.paths
            .log_file
            .as_deref()
            .map(|p| resolve(working_dir, p))
    }

    pub fn event_log_path(&self, working_dir: &Path) -> Option<PathBuf> {
        self.paths
            .event_log
            .as_deref()
            .map(|p| resolve(working_dir, p))
    }
}

fn resolve(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_full_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[api]
model = "gemini-2.5-pro"
max_attempts = 3
backoff_base = "500ms"
request_timeout = "30s"

[loop]
threshold = 85
stall_limit = 4
total_strategy = "local"

[rubric]
criteria = 10
weight = 10

[paths]
rules = "docs/rules.txt"
database = "/tmp/letterloop.db"
event_log = "logs/events.jsonl"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        let client = config.client_settings();
        assert_eq!(client.max_attempts, 3);
        assert_eq!(client.backoff_base, Duration::from_millis(500));
        assert_eq!(client.request_timeout, Duration::from_secs(30));

        let settings = config.loop_settings(None, None, None);
        assert_eq!(settings.threshold, 85);
        assert_eq!(settings.max_attempts, None);
        assert_eq!(settings.stall_limit, Some(4));

        assert_eq!(config.rubric_spec().max_total(), 100);
        assert_eq!(config.total_strategy(None), TotalStrategy::Local);
        assert_eq!(
            config.rules_path(dir.path(), None),
            dir.path().join("docs/rules.txt")
        );
        assert_eq!(
            config.database_path(dir.path(), None),
            Some(PathBuf::from("/tmp/letterloop.db"))
        );
        assert_eq!(
            config.event_log_path(dir.path()),
            Some(dir.path().join("logs/events.jsonl"))
        );
        assert!(config.log_file_path(dir.path()).is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let config: ProjectConfig = toml::from_str("[loop]\nthreshold = 80\nmax_attempts = 5").unwrap();
        let settings = config.loop_settings(Some(2), Some(95), None);
        assert_eq!(settings.threshold, 95);
        assert_eq!(settings.max_attempts, Some(2));
        assert_eq!(
            config.total_strategy(Some(TotalStrategy::Model)),
            TotalStrategy::Model
        );
    }

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        let dir = Path::new("/work");
        assert_eq!(config.loop_settings(None, None, None), LoopSettings::default());
        assert_eq!(config.rules_path(dir, None), dir.join("Rules.txt"));
        assert_eq!(config.key_file_path(dir, None), dir.join("API_KEY.txt"));
        assert!(config.database_path(dir, None).is_none());
        assert!(config.event_log_path(dir).is_none());
        assert_eq!(config.client_settings().max_attempts, 5);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let result: Result<ProjectConfig, _> = toml::from_str("[loop]\nthreshhold = 80");
        assert!(result.is_err());
    }
}
