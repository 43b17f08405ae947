//! Commit message generation.
//!
//! An optional [`TextBackend`] gets one bounded call with a truncated diff
//! summary. Any backend failure, a timeout, or an empty reply falls back to
//! the template, which needs nothing but the changeset. [`MessageGenerator::generate`]
//! therefore never fails and never returns an empty string.

mod openai;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::AiIntegrationConfig;
use crate::domain::{BackendError, ChangeSet};

pub use openai::OpenAiBackend;

/// Maximum diff characters sent to the backend.
pub const MAX_DIFF_CHARS: usize = 2000;

/// An external text-generation service.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

pub struct MessageGenerator {
    backend: Option<Arc<dyn TextBackend>>,
    timeout: Duration,
}

impl MessageGenerator {
    pub fn template_only() -> Self {
        Self {
            backend: None,
            timeout: Duration::from_secs(crate::config::MAX_BACKEND_TIMEOUT_SECS),
        }
    }

    pub fn with_backend(backend: Arc<dyn TextBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// Build from configuration. A disabled section, a missing API key, or
    /// a client that cannot be built all silently select the template.
    pub fn from_config(config: &AiIntegrationConfig) -> Self {
        if !config.enabled {
            return Self::template_only();
        }
        let Some(api_key) = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            warn!(
                env = %config.api_key_env,
                "AI message generation enabled but no API key found, using templates"
            );
            return Self::template_only();
        };

        match OpenAiBackend::new(api_key, &config.model, &config.base_url, config.timeout()) {
            Ok(backend) => Self::with_backend(Arc::new(backend), config.timeout()),
            Err(e) => {
                warn!(error = %e, "could not build AI backend, using templates");
                Self::template_only()
            }
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Produce a commit message for `changes`.
    ///
    /// `diff` is the staged diff summary; the backend is skipped when it is
    /// empty.
    pub async fn generate(&self, changes: &ChangeSet, diff: &str) -> String {
        if let Some(backend) = &self.backend {
            if !diff.trim().is_empty() {
                match self.ask_backend(backend.as_ref(), diff).await {
                    Ok(message) => return message,
                    Err(e) => warn!(error = %e, "AI commit message generation failed"),
                }
            }
        }
        template_message(changes)
    }

    async fn ask_backend(&self, backend: &dyn TextBackend, diff: &str) -> Result<String, BackendError> {
        let prompt = build_prompt(diff);
        let reply = tokio::time::timeout(self.timeout, backend.complete(&prompt))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout.as_secs()))??;
        let message = clean_reply(&reply).ok_or(BackendError::EmptyResponse)?;
        debug!(message = %message, "generated commit message");
        Ok(message)
    }
}

/// `auto: update <basename>` for one file, `auto: update <N> files` otherwise.
pub fn template_message(changes: &ChangeSet) -> String {
    if changes.len() == 1 {
        let only = changes.iter().next().unwrap_or_default();
        let name = Path::new(only)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| only.to_string());
        format!("auto: update {name}")
    } else {
        format!("auto: update {} files", changes.len())
    }
}

pub fn build_prompt(diff: &str) -> String {
    let truncated: String = diff.chars().take(MAX_DIFF_CHARS).collect();
    format!(
        "Summarize the following git diff into a single, concise commit message \
         following conventional commit guidelines (type: subject). \
         Focus on the main purpose of the changes.\n\n\
         Diff:\n{truncated}\n\n\
         Generate only the commit message, no explanation."
    )
}

fn clean_reply(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedBackend;

    fn changes(paths: &[&str]) -> ChangeSet {
        paths.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_template_single_file_uses_basename() {
        let gen = MessageGenerator::template_only();
        assert_eq!(
            gen.generate(&changes(&["foo.py"]), "").await,
            "auto: update foo.py"
        );
        assert_eq!(
            gen.generate(&changes(&["src/deep/bar.rs"]), "diff").await,
            "auto: update bar.rs"
        );
    }

    #[tokio::test]
    async fn test_template_multiple_files_counts() {
        let gen = MessageGenerator::template_only();
        assert_eq!(
            gen.generate(&changes(&["a.py", "b.py", "c.py"]), "").await,
            "auto: update 3 files"
        );
    }

    #[tokio::test]
    async fn test_backend_reply_is_unquoted() {
        let backend = Arc::new(ScriptedBackend::replying("  \"feat: add parser\"\n"));
        let gen = MessageGenerator::with_backend(backend, Duration::from_secs(5));
        let msg = gen.generate(&changes(&["a.rs"]), " a.rs | 3 +++").await;
        assert_eq!(msg, "feat: add parser");
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back() {
        let backend = Arc::new(ScriptedBackend::failing("503"));
        let gen = MessageGenerator::with_backend(backend, Duration::from_secs(5));
        let msg = gen.generate(&changes(&["a.rs", "b.rs"]), "stat").await;
        assert_eq!(msg, "auto: update 2 files");
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back() {
        let backend = Arc::new(ScriptedBackend::replying("''"));
        let gen = MessageGenerator::with_backend(backend, Duration::from_secs(5));
        let msg = gen.generate(&changes(&["a.rs"]), "stat").await;
        assert_eq!(msg, "auto: update a.rs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let backend =
            Arc::new(ScriptedBackend::replying("feat: late").with_delay(Duration::from_secs(30)));
        let gen = MessageGenerator::with_backend(backend, Duration::from_secs(5));
        let msg = gen.generate(&changes(&["a.rs"]), "stat").await;
        assert_eq!(msg, "auto: update a.rs");
    }

    #[tokio::test]
    async fn test_empty_diff_skips_backend() {
        let backend = Arc::new(ScriptedBackend::replying("feat: unused"));
        let gen = MessageGenerator::with_backend(backend.clone(), Duration::from_secs(5));
        let msg = gen.generate(&changes(&["a.rs"]), "   ").await;
        assert_eq!(msg, "auto: update a.rs");
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_truncates_diff() {
        let backend = Arc::new(ScriptedBackend::replying("chore: big"));
        let gen = MessageGenerator::with_backend(backend.clone(), Duration::from_secs(5));
        let diff = "x".repeat(MAX_DIFF_CHARS * 2);
        gen.generate(&changes(&["a.rs"]), &diff).await;

        let prompt = &backend.prompts()[0];
        let xs = prompt.chars().filter(|c| *c == 'x').count();
        assert_eq!(xs, MAX_DIFF_CHARS);
    }

    #[test]
    fn test_disabled_config_is_template_only() {
        let gen = MessageGenerator::from_config(&AiIntegrationConfig::default());
        assert!(!gen.has_backend());
    }

    #[test]
    fn test_missing_api_key_is_template_only() {
        let config = AiIntegrationConfig {
            enabled: true,
            api_key_env: "AUTOCOMMIT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AiIntegrationConfig::default()
        };
        assert!(!MessageGenerator::from_config(&config).has_backend());
    }
}
