//! Built-in autocommit plugins and the static registry that maps
//! `plugins.enabled` identifiers onto them.
//!
//! | id                     | hooks                      |
//! |------------------------|----------------------------|
//! | `smart_commit_message` | pre_commit, post_commit    |
//! | `file_prioritization`  | pre_commit, post_commit    |
//! | `commit_karma`         | pre_commit, post_commit    |
//! | `mobile_integration`   | on_push, on_error          |
//! | `code_quality_notes`   | pre_commit, post_commit    |
//! | `intention_aware`      | post_commit                |

pub mod code_quality;
pub mod file_priority;
pub mod intention;
pub mod karma;
pub mod mobile;
pub mod smart_message;

use std::fmt;
use std::str::FromStr;

use autocommit_core::{AutoCommitError, Config, HookPipeline, Plugin, Result};
use regex::{Regex, RegexBuilder};
use tracing::info;

pub use code_quality::CodeQualityNotesPlugin;
pub use file_priority::FilePrioritizationPlugin;
pub use intention::IntentionAwarePlugin;
pub use karma::{CommitKarmaPlugin, KarmaLevel, KarmaStore};
pub use mobile::{MobileIntegrationPlugin, PushoverCredentials};
pub use smart_message::SmartCommitMessagePlugin;

/// Every plugin this build knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginId {
    SmartCommitMessage,
    FilePrioritization,
    CommitKarma,
    MobileIntegration,
    CodeQualityNotes,
    IntentionAware,
}

impl PluginId {
    pub const ALL: [PluginId; 6] = [
        PluginId::SmartCommitMessage,
        PluginId::FilePrioritization,
        PluginId::CommitKarma,
        PluginId::MobileIntegration,
        PluginId::CodeQualityNotes,
        PluginId::IntentionAware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginId::SmartCommitMessage => "smart_commit_message",
            PluginId::FilePrioritization => "file_prioritization",
            PluginId::CommitKarma => "commit_karma",
            PluginId::MobileIntegration => "mobile_integration",
            PluginId::CodeQualityNotes => "code_quality_notes",
            PluginId::IntentionAware => "intention_aware",
        }
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginId {
    type Err = AutoCommitError;

    fn from_str(s: &str) -> Result<Self> {
        PluginId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| {
                AutoCommitError::config(format!(
                    "unknown plugin '{s}' (available: {})",
                    available_plugins().join(", ")
                ))
            })
    }
}

/// Identifiers accepted in `plugins.enabled`.
pub fn available_plugins() -> Vec<&'static str> {
    PluginId::ALL.iter().map(|id| id.as_str()).collect()
}

/// Instantiate the configured plugins, in configured order.
pub fn build_plugins(config: &Config) -> Result<Vec<Box<dyn Plugin>>> {
    let state_dir = config.plugins.state_dir();
    let mut plugins: Vec<Box<dyn Plugin>> = Vec::with_capacity(config.plugins.enabled.len());
    for raw in &config.plugins.enabled {
        let plugin: Box<dyn Plugin> = match raw.parse::<PluginId>()? {
            PluginId::SmartCommitMessage => Box::new(SmartCommitMessagePlugin::new()),
            PluginId::FilePrioritization => Box::new(FilePrioritizationPlugin::new()),
            PluginId::CommitKarma => Box::new(CommitKarmaPlugin::new(KarmaStore::open(
                state_dir.join(karma::KARMA_FILE),
            )?)),
            PluginId::MobileIntegration => {
                Box::new(MobileIntegrationPlugin::new(PushoverCredentials::from_env()))
            }
            PluginId::CodeQualityNotes => Box::new(CodeQualityNotesPlugin::new()),
            PluginId::IntentionAware => Box::new(IntentionAwarePlugin::new()),
        };
        plugins.push(plugin);
    }
    info!(plugins = ?config.plugins.enabled, "plugins loaded");
    Ok(plugins)
}

pub fn build_pipeline(config: &Config) -> Result<HookPipeline> {
    Ok(HookPipeline::new(build_plugins(config)?))
}

/// Compile a static pattern table. Invalid entries are skipped.
pub(crate) fn compile_all(patterns: &[&str], case_insensitive: bool) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(case_insensitive)
                .build()
                .ok()
        })
        .collect()
}

/// Lowercased extension including the dot, e.g. `.rs`.
pub(crate) fn extension(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_registry() {
        for id in PluginId::ALL {
            assert_eq!(id.as_str().parse::<PluginId>().unwrap(), id);
        }
        assert_eq!(available_plugins().len(), 6);
    }

    #[test]
    fn unknown_id_is_configuration_error() {
        let err = "bug_risk_score".parse::<PluginId>().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("smart_commit_message"));
    }

    #[test]
    fn build_plugins_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.plugins.state_dir = Some(dir.path().to_path_buf());
        config.plugins.enabled = vec![
            "commit_karma".to_string(),
            "smart_commit_message".to_string(),
            "file_prioritization".to_string(),
        ];

        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(
            pipeline.names(),
            vec!["commit_karma", "smart_commit_message", "file_prioritization"]
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("src/Main.RS").as_deref(), Some(".rs"));
        assert_eq!(extension("Makefile"), None);
    }
}
