//! YAML configuration.
//!
//! Every section and field is optional; missing values take the defaults
//! below. [`Config::validate`] turns every malformed value into a
//! [`AutoCommitError::Configuration`] before anything touches the repository.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AutoCommitError, Result};
use crate::gate::{GatePolicy, QuietHours};

pub const DEFAULT_CONFIG_PATH: &str = "auto_committer_config.yaml";

/// Upper bound for the text-generation call.
pub const MAX_BACKEND_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub scheduling: SchedulingConfig,
    pub file_monitoring: FileMonitoringConfig,
    pub commit_behavior: CommitBehaviorConfig,
    pub security: SecurityConfig,
    pub ai_integration: AiIntegrationConfig,
    pub plugins: PluginsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub path: PathBuf,
    pub remote: String,
    pub branch: String,
    /// Push after every successful commit.
    pub auto_push: bool,
    /// Push pending local commits even when the working tree is clean.
    pub retry_unpushed: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            auto_push: true,
            retry_unpushed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub quiet_hours: Option<QuietHoursConfig>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            quiet_hours: None,
        }
    }
}

/// Local time-of-day strings, `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHoursConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMonitoringConfig {
    pub enabled: bool,
    pub debounce_seconds: u64,
    pub stabilize_seconds: u64,
    pub ignore_patterns: Vec<String>,
}

impl Default for FileMonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_seconds: 5,
            stabilize_seconds: 1,
            ignore_patterns: vec![
                ".git".to_string(),
                "*.swp".to_string(),
                "*.tmp".to_string(),
                "~".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitBehaviorConfig {
    pub min_files_for_commit: usize,
    pub max_files_per_commit: usize,
}

impl Default for CommitBehaviorConfig {
    fn default() -> Self {
        Self {
            min_files_for_commit: 1,
            max_files_per_commit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub scan_for_secrets: bool,
    pub secret_patterns: Vec<String>,
    pub blocked_extensions: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            scan_for_secrets: true,
            secret_patterns: vec![
                r"AKIA[0-9A-Z]{16}".to_string(),
                r"-----BEGIN [A-Z ]*PRIVATE KEY-----".to_string(),
                r#"(api[_-]?key|secret|password|token)\s*[:=]\s*['"][^'"\s]{8,}['"]"#.to_string(),
            ],
            blocked_extensions: vec![
                ".pem".to_string(),
                ".key".to_string(),
                ".p12".to_string(),
                ".pfx".to_string(),
                ".jks".to_string(),
                ".keystore".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiIntegrationConfig {
    pub enabled: bool,
    pub model: String,
    pub timeout_seconds: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for AiIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-3.5-turbo".to_string(),
            timeout_seconds: MAX_BACKEND_TIMEOUT_SECS,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

impl AiIntegrationConfig {
    /// Configured timeout, never above [`MAX_BACKEND_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.clamp(1, MAX_BACKEND_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugin identifiers, in invocation order.
    pub enabled: Vec<String>,
    /// Where plugins keep cross-run state. Defaults to `~/.autocommit`.
    pub state_dir: Option<PathBuf>,
}

impl PluginsConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".autocommit")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Read and parse a configuration file. Does not validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutoCommitError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| AutoCommitError::config(format!("invalid configuration: {e}")))
    }

    /// Check every value that could fail later at runtime.
    ///
    /// `known_plugins` is the static plugin registry; every entry of
    /// `plugins.enabled` must appear in it.
    pub fn validate(&self, known_plugins: &[&str]) -> Result<()> {
        if !self.repository.path.is_dir() {
            return Err(AutoCommitError::config(format!(
                "repository path does not exist: {}",
                self.repository.path.display()
            )));
        }
        if self.repository.remote.trim().is_empty() || self.repository.branch.trim().is_empty() {
            return Err(AutoCommitError::config(
                "repository.remote and repository.branch must not be empty",
            ));
        }
        if self.scheduling.enabled && self.scheduling.interval_minutes == 0 {
            return Err(AutoCommitError::config(
                "scheduling.interval_minutes must be greater than zero",
            ));
        }
        if self.file_monitoring.enabled && self.file_monitoring.debounce_seconds == 0 {
            return Err(AutoCommitError::config(
                "file_monitoring.debounce_seconds must be greater than zero",
            ));
        }

        self.gate_policy()?;
        crate::security::compile_patterns(&self.security.secret_patterns)?;

        for id in &self.plugins.enabled {
            if !known_plugins.contains(&id.as_str()) {
                return Err(AutoCommitError::config(format!(
                    "unknown plugin '{id}' (available: {})",
                    known_plugins.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn quiet_hours(&self) -> Result<Option<QuietHours>> {
        self.scheduling
            .quiet_hours
            .as_ref()
            .map(|q| QuietHours::parse(&q.start, &q.end))
            .transpose()
    }

    pub fn gate_policy(&self) -> Result<GatePolicy> {
        let min = self.commit_behavior.min_files_for_commit;
        let max = self.commit_behavior.max_files_per_commit;
        if min > max {
            return Err(AutoCommitError::config(format!(
                "commit_behavior.min_files_for_commit ({min}) exceeds max_files_per_commit ({max})"
            )));
        }
        Ok(GatePolicy {
            quiet_hours: self.quiet_hours()?,
            min_files: min,
            max_files: max,
        })
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.scheduling.interval_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.repository.remote, "origin");
        assert_eq!(config.commit_behavior.max_files_per_commit, 50);
        assert_eq!(config.file_monitoring.debounce_seconds, 5);
        assert_eq!(config.scheduling.interval_minutes, 30);
        assert!(!config.ai_integration.enabled);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let raw = r#"
repository:
  path: "/tmp"
  branch: "develop"
scheduling:
  interval_minutes: 10
  quiet_hours:
    start: "22:00"
    end: "06:00"
commit_behavior:
  max_files_per_commit: 5
plugins:
  enabled: [commit_karma, smart_commit_message]
"#;
        let config = Config::from_yaml(raw).unwrap();
        assert_eq!(config.repository.branch, "develop");
        assert_eq!(config.repository.remote, "origin");
        assert!(config.scheduling.enabled);
        assert_eq!(config.schedule_interval(), Duration::from_secs(600));
        assert_eq!(config.commit_behavior.min_files_for_commit, 1);
        assert_eq!(
            config.plugins.enabled,
            vec!["commit_karma".to_string(), "smart_commit_message".to_string()]
        );
        assert!(config.quiet_hours().unwrap().is_some());
    }

    #[test]
    fn test_malformed_yaml_is_configuration_error() {
        let err = Config::from_yaml("repository: [unclosed").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, AutoCommitError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.repository.path = dir.path().to_path_buf();
        config.plugins.enabled = vec!["does_not_exist".to_string()];

        let err = config.validate(&["commit_karma"]).unwrap_err();
        assert!(err.to_string().contains("does_not_exist"));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.repository.path = dir.path().to_path_buf();
        config.commit_behavior.min_files_for_commit = 10;
        config.commit_behavior.max_files_per_commit = 2;

        assert!(config.validate(&[]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_quiet_hours_and_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.repository.path = dir.path().to_path_buf();
        config.scheduling.quiet_hours = Some(QuietHoursConfig {
            start: "25:99".to_string(),
            end: "06:00".to_string(),
        });
        assert!(config.validate(&[]).is_err());

        config.scheduling.quiet_hours = None;
        config.security.secret_patterns = vec!["(unclosed".to_string()];
        assert!(config.validate(&[]).is_err());
    }

    #[test]
    fn test_validate_accepts_defaults_for_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.repository.path = dir.path().to_path_buf();
        assert!(config.validate(&[]).is_ok());
    }

    #[test]
    fn test_backend_timeout_is_capped() {
        let mut ai = AiIntegrationConfig::default();
        ai.timeout_seconds = 60;
        assert_eq!(ai.timeout(), Duration::from_secs(MAX_BACKEND_TIMEOUT_SECS));
        ai.timeout_seconds = 0;
        assert_eq!(ai.timeout(), Duration::from_secs(1));
    }
}
