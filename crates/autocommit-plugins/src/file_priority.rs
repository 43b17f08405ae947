//! Scores each changed file 1 to 10 for review priority and lists them by
//! tier in the commit message.

use async_trait::async_trait;
use autocommit_core::{ChangeSet, CommitRecord, HookContext, MessageComposer, Plugin, PluginState};
use regex::Regex;

use crate::{compile_all, extension};

pub const HIGH_PRIORITY: u8 = 7;
pub const MEDIUM_PRIORITY: u8 = 4;

/// Path keyword groups and the weight each contributes.
const PATH_WEIGHTS: &[(&str, u32)] = &[
    // What the file is.
    (r"(auth|security|encrypt|password|token)", 10),
    (r"(db|database|sql|migration|schema)", 8),
    (r"(api|endpoint|controller|route)", 7),
    (r"(config|conf|settings|\.env|\.ini|\.ya?ml|\.json|\.xml|\.toml)", 6),
    (r"(core|main|app|server|service)", 8),
    (r"(test|spec)", 3),
    (r"(doc|readme|guide|manual|tutorial)", 2),
    // What the change looks like.
    (r"(security|vulnerability|exploit|attack)", 10),
    (r"(fix|bug|issue|error|exception)", 8),
    (r"(feature|add|implement|create|new)", 7),
    (r"(refactor|restructure|reorganize|cleanup)", 5),
    (r"(performance|optimize|speed|fast)", 6),
];

const EXTENSION_WEIGHTS: &[(&str, u32)] = &[
    (".rs", 6),
    (".py", 5),
    (".js", 5),
    (".ts", 5),
    (".java", 5),
    (".go", 5),
    (".cpp", 6),
    (".c", 6),
    (".h", 5),
    (".sql", 8),
    (".html", 3),
    (".css", 3),
    (".json", 4),
    (".xml", 4),
    (".yaml", 4),
    (".yml", 4),
    (".toml", 4),
    (".md", 2),
    (".txt", 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn of(score: u8) -> Self {
        if score >= HIGH_PRIORITY {
            Tier::High
        } else if score >= MEDIUM_PRIORITY {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            Tier::High => "High Priority:",
            Tier::Medium => "Medium Priority:",
            Tier::Low => "Low Priority:",
        }
    }
}

/// Files sorted by descending score; ties keep path order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ranking(Vec<(String, u8)>);

impl Ranking {
    fn render(&self) -> String {
        let mut out = String::from("File Prioritization for Review:");
        for tier in [Tier::High, Tier::Medium, Tier::Low] {
            let files: Vec<&str> = self
                .0
                .iter()
                .filter(|(_, score)| Tier::of(*score) == tier)
                .map(|(path, _)| path.as_str())
                .collect();
            if files.is_empty() {
                continue;
            }
            out.push_str("\n\n");
            out.push_str(tier.heading());
            for path in files {
                out.push_str("\n- ");
                out.push_str(path);
            }
        }
        out
    }
}

pub struct FilePrioritizationPlugin {
    weights: Vec<(Regex, u32)>,
}

impl FilePrioritizationPlugin {
    pub fn new() -> Self {
        let weights = PATH_WEIGHTS
            .iter()
            .filter_map(|(pattern, weight)| {
                compile_all(&[*pattern], true)
                    .into_iter()
                    .next()
                    .map(|re| (re, *weight))
            })
            .collect();
        Self { weights }
    }

    /// Review priority of one path, clamped to 1..=10.
    pub fn score(&self, path: &str) -> u8 {
        let mut total: u32 = self
            .weights
            .iter()
            .filter(|(re, _)| re.is_match(path))
            .map(|(_, w)| *w)
            .sum();
        if let Some(ext) = extension(path) {
            total += EXTENSION_WEIGHTS
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, w)| *w)
                .unwrap_or(0);
        }
        total.clamp(1, 10) as u8
    }

    fn rank(&self, changes: &ChangeSet) -> Ranking {
        let mut ranked: Vec<(String, u8)> = changes
            .iter()
            .map(|path| (path.to_string(), self.score(path)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        Ranking(ranked)
    }
}

impl Default for FilePrioritizationPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for FilePrioritizationPlugin {
    fn name(&self) -> &str {
        "file_prioritization"
    }

    async fn pre_commit(
        &self,
        _ctx: &HookContext<'_>,
        changes: &ChangeSet,
    ) -> anyhow::Result<Option<PluginState>> {
        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(PluginState::new(self.rank(changes))))
    }

    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        _commit: &CommitRecord,
        state: Option<&PluginState>,
        composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        if let Some(ranking) = state.and_then(|s| s.downcast_ref::<Ranking>()) {
            composer.append_section(ranking.render());
        }
        Ok(())
    }
}
