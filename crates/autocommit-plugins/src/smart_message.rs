//! Adds file-category and change-intent context to short commit messages.

use async_trait::async_trait;
use autocommit_core::{ChangeSet, CommitRecord, HookContext, MessageComposer, Plugin, PluginState};
use regex::Regex;

use crate::compile_all;

const CATEGORIES: &[(&str, &[&str])] = &[
    ("frontend", &[r"\.(js|jsx|ts|tsx|css|scss|html|vue)$"]),
    ("backend", &[r"\.(py|rs|java|c|cpp|go|rb|php)$"]),
    ("database", &[r"\.(sql|db|sqlite)$"]),
    ("config", &[r"\.(yaml|yml|json|toml|xml|ini|conf|config)$"]),
    ("test", &[r"\.(test|spec)\.(js|py|java)$", r"test_.*\.py$", r"_test\.rs$"]),
    ("documentation", &[r"\.(md|rst|txt|doc|docx)$"]),
];

const FEATURE_WORDS: &[&str] = &["feature", "add", "new", "create", "implement", "enhance", "improve", "upgrade"];
const BUGFIX_WORDS: &[&str] = &["fix", "bug", "issue", "error", "fail", "correct", "repair", "resolve"];
const REFACTOR_WORDS: &[&str] = &["refactor", "restructure", "reorganize", "clean", "optimize", "improve", "enhance"];

/// Messages with more lines than this are left alone.
const MAX_LINES_TO_ENHANCE: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChangeContext {
    /// Category name and file count, in category declaration order.
    file_types: Vec<(&'static str, usize)>,
    change_types: Vec<&'static str>,
}

impl ChangeContext {
    fn is_empty(&self) -> bool {
        self.file_types.is_empty() && self.change_types.is_empty()
    }

    fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.file_types.is_empty() {
            let types: Vec<String> = self
                .file_types
                .iter()
                .map(|(name, n)| format!("{name}: {n}"))
                .collect();
            lines.push(format!("Changed file types: {}", types.join(", ")));
        }
        if !self.change_types.is_empty() {
            lines.push(format!("Change type: {}", self.change_types.join(", ")));
        }
        lines.join("\n")
    }
}

pub struct SmartCommitMessagePlugin {
    categories: Vec<(&'static str, Vec<Regex>)>,
    intents: Vec<(&'static str, Vec<Regex>)>,
}

impl SmartCommitMessagePlugin {
    pub fn new() -> Self {
        Self {
            categories: CATEGORIES
                .iter()
                .map(|(name, patterns)| (*name, compile_all(patterns, false)))
                .collect(),
            intents: vec![
                ("feature", compile_all(FEATURE_WORDS, true)),
                ("bugfix", compile_all(BUGFIX_WORDS, true)),
                ("refactor", compile_all(REFACTOR_WORDS, true)),
            ],
        }
    }

    fn analyze(&self, changes: &ChangeSet) -> ChangeContext {
        let file_types = self
            .categories
            .iter()
            .filter_map(|(name, patterns)| {
                let count = changes
                    .iter()
                    .filter(|path| patterns.iter().any(|re| re.is_match(path)))
                    .count();
                (count > 0).then_some((*name, count))
            })
            .collect();

        let change_types = self
            .intents
            .iter()
            .filter(|(_, words)| changes.iter().any(|path| words.iter().any(|re| re.is_match(path))))
            .map(|(name, _)| *name)
            .collect();

        ChangeContext {
            file_types,
            change_types,
        }
    }
}

impl Default for SmartCommitMessagePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SmartCommitMessagePlugin {
    fn name(&self) -> &str {
        "smart_commit_message"
    }

    async fn pre_commit(
        &self,
        _ctx: &HookContext<'_>,
        changes: &ChangeSet,
    ) -> anyhow::Result<Option<PluginState>> {
        let context = self.analyze(changes);
        Ok((!context.is_empty()).then(|| PluginState::new(context)))
    }

    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        _commit: &CommitRecord,
        state: Option<&PluginState>,
        composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        let Some(context) = state.and_then(|s| s.downcast_ref::<ChangeContext>()) else {
            return Ok(());
        };
        if composer.current().lines().count() > MAX_LINES_TO_ENHANCE {
            return Ok(());
        }
        composer.append_section(context.render());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocommit_core::fakes::FakeVcs;
    use chrono::Utc;
    use uuid::Uuid;

    fn commit(message: &str) -> CommitRecord {
        CommitRecord {
            hash: "b".repeat(40),
            message: message.to_string(),
            author: "t <t@example.com>".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn categorizes_by_extension_and_intent() {
        let plugin = SmartCommitMessagePlugin::new();
        let changes: ChangeSet = ["web/app.tsx", "api/fix_login.py", "schema.sql", "README.md"]
            .into_iter()
            .collect();
        let ctx = plugin.analyze(&changes);
        assert_eq!(
            ctx.file_types,
            vec![("frontend", 1), ("backend", 1), ("database", 1), ("documentation", 1)]
        );
        assert_eq!(ctx.change_types, vec!["bugfix"]);
        assert_eq!(
            ctx.render(),
            "Changed file types: frontend: 1, backend: 1, database: 1, documentation: 1\nChange type: bugfix"
        );
    }

    #[tokio::test]
    async fn appends_context_to_short_message() {
        let plugin = SmartCommitMessagePlugin::new();
        let vcs = FakeVcs::new("/repo");
        let ctx = HookContext::new(&vcs, Uuid::new_v4());
        let changes: ChangeSet = ["src/new_parser.rs"].into_iter().collect();

        let state = plugin.pre_commit(&ctx, &changes).await.unwrap();
        let c = commit("auto: update new_parser.rs");
        let mut composer = MessageComposer::new(c.message.clone());
        plugin
            .post_commit(&ctx, &c, state.as_ref(), &mut composer)
            .await
            .unwrap();

        assert_eq!(
            composer.current(),
            "auto: update new_parser.rs\n\nChanged file types: backend: 1\nChange type: feature"
        );
    }

    #[tokio::test]
    async fn leaves_detailed_message_alone() {
        let plugin = SmartCommitMessagePlugin::new();
        let vcs = FakeVcs::new("/repo");
        let ctx = HookContext::new(&vcs, Uuid::new_v4());
        let changes: ChangeSet = ["main.py"].into_iter().collect();

        let state = plugin.pre_commit(&ctx, &changes).await.unwrap();
        let c = commit("feat: x\n\nline one\nline two");
        let mut composer = MessageComposer::new(c.message.clone());
        plugin
            .post_commit(&ctx, &c, state.as_ref(), &mut composer)
            .await
            .unwrap();
        assert!(!composer.changed());
    }

    #[tokio::test]
    async fn no_state_without_recognizable_files() {
        let plugin = SmartCommitMessagePlugin::new();
        let vcs = FakeVcs::new("/repo");
        let ctx = HookContext::new(&vcs, Uuid::new_v4());
        let changes: ChangeSet = ["Makefile"].into_iter().collect();
        assert!(plugin.pre_commit(&ctx, &changes).await.unwrap().is_none());
    }
}
