//! Commit karma: scores each commit for good practice and keeps a running
//! total across runs in a JSON file owned by this plugin.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use autocommit_core::{
    AutoCommitError, ChangeSet, CommitRecord, HookContext, MessageComposer, Plugin, PluginState,
    Result,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{compile_all, extension};

pub const KARMA_FILE: &str = "karma.json";
pub const SCHEMA_VERSION: u32 = 1;

const TOO_MANY_FILES: usize = 10;

const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".pdf", ".zip", ".tar", ".gz", ".rar", ".7z",
    ".exe", ".dll", ".so", ".dylib",
];

// Message rules, matched against the whole message.
const MESSAGE_RULES: &[(&str, &str, i64)] = &[
    ("descriptive", r"^[A-Z][a-z]+(?:\([a-z]+\))?: .{10,}", 5),
    ("follows_convention", r"^(feat|fix|docs|style|refactor|test|chore)(?:\([a-z]+\))?: ", 3),
    ("references_issue", r"(?:#|issue|ticket)\d+", 2),
    ("too_short", r"^.{0,10}$", -2),
    ("too_long", r"^.{100,}$", -1),
];

// Code rules: points are awarded per file whose content does NOT match.
const CODE_RULES: &[(&str, &str, i64)] = &[
    ("no_todos", r"(TODO|FIXME|XXX|HACK)", 2),
    ("no_commented_code", r"//.*\{.*\}", 2),
    ("no_debug_code", r"(debug|console\.log|print|alert)", 3),
    ("no_console_logs", r"console\.log", 2),
];

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KarmaLevel {
    Novice,
    Apprentice,
    Journeyman,
    Master,
    Grandmaster,
    Legend,
}

impl KarmaLevel {
    pub fn from_total(total: i64) -> Self {
        match total {
            t if t < 10 => KarmaLevel::Novice,
            t if t < 50 => KarmaLevel::Apprentice,
            t if t < 100 => KarmaLevel::Journeyman,
            t if t < 200 => KarmaLevel::Master,
            t if t < 500 => KarmaLevel::Grandmaster,
            _ => KarmaLevel::Legend,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KarmaLevel::Novice => "Novice",
            KarmaLevel::Apprentice => "Apprentice",
            KarmaLevel::Journeyman => "Journeyman",
            KarmaLevel::Master => "Master",
            KarmaLevel::Grandmaster => "Grandmaster",
            KarmaLevel::Legend => "Legend",
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaEntry {
    pub date: DateTime<Utc>,
    pub commit: String,
    pub subject: String,
    pub karma: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KarmaData {
    /// Files written before versioning have no field and read as 0.
    #[serde(default)]
    version: u32,
    total_karma: i64,
    karma_level: KarmaLevel,
    #[serde(default)]
    commits: Vec<KarmaEntry>,
}

impl Default for KarmaData {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            total_karma: 0,
            karma_level: KarmaLevel::Novice,
            commits: Vec::new(),
        }
    }
}

/// Running karma total, loaded once and saved after every change.
#[derive(Debug)]
pub struct KarmaStore {
    path: PathBuf,
    data: KarmaData,
}

impl KarmaStore {
    /// Load `path`, or start empty if it does not exist.
    ///
    /// A corrupt file is logged and replaced on the next save. A file from a
    /// newer schema version is a configuration error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<KarmaData>(&raw) {
                Ok(mut data) => {
                    if data.version > SCHEMA_VERSION {
                        return Err(AutoCommitError::config(format!(
                            "karma file {} has schema version {}, newest supported is {SCHEMA_VERSION}",
                            path.display(),
                            data.version
                        )));
                    }
                    data.version = SCHEMA_VERSION;
                    data
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt karma file, starting fresh");
                    KarmaData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KarmaData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total(&self) -> i64 {
        self.data.total_karma
    }

    pub fn level(&self) -> KarmaLevel {
        self.data.karma_level
    }

    pub fn entries(&self) -> &[KarmaEntry] {
        &self.data.commits
    }

    /// Add one commit's karma and persist.
    pub fn record(&mut self, entry: KarmaEntry) -> Result<()> {
        self.data.total_karma += entry.karma;
        self.data.karma_level = KarmaLevel::from_total(self.data.total_karma);
        self.data.commits.push(entry);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Points per rule, in rule order. Zero-point rules are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Breakdown(Vec<(&'static str, i64)>);

impl Breakdown {
    fn add(&mut self, rule: &'static str, points: i64) {
        if let Some(slot) = self.0.iter_mut().find(|(r, _)| *r == rule) {
            slot.1 += points;
        } else {
            self.0.push((rule, points));
        }
    }

    fn sum(&self) -> i64 {
        self.0.iter().map(|(_, p)| p).sum()
    }

    fn render(&self, heading: &str, out: &mut String) {
        if self.0.is_empty() {
            return;
        }
        out.push_str(&format!("\n- {heading}:"));
        for (rule, points) in &self.0 {
            out.push_str(&format!("\n  - {rule}: {points} points"));
        }
    }
}

/// What pre_commit learned from the staged files.
#[derive(Debug, Clone, Default)]
struct FileKarma {
    files: Breakdown,
    code: Breakdown,
}

pub struct CommitKarmaPlugin {
    store: Mutex<KarmaStore>,
    message_rules: Vec<(&'static str, Regex, i64)>,
    code_rules: Vec<(&'static str, Regex, i64)>,
    tests: Option<Regex>,
    docs: Option<Regex>,
}

fn compile_rules(rules: &[(&'static str, &str, i64)]) -> Vec<(&'static str, Regex, i64)> {
    rules
        .iter()
        .filter_map(|(name, pattern, points)| {
            compile_all(&[*pattern], true)
                .into_iter()
                .next()
                .map(|re| (*name, re, *points))
        })
        .collect()
}

impl CommitKarmaPlugin {
    pub fn new(store: KarmaStore) -> Self {
        Self {
            store: Mutex::new(store),
            message_rules: compile_rules(MESSAGE_RULES),
            code_rules: compile_rules(CODE_RULES),
            tests: compile_all(&[r"(test|spec)"], true).pop(),
            docs: compile_all(&[r"(doc|readme|guide|manual|tutorial)"], true).pop(),
        }
    }

    pub fn total(&self) -> i64 {
        self.store.lock().map(|s| s.total()).unwrap_or_default()
    }

    fn score_message(&self, message: &str) -> Breakdown {
        let mut b = Breakdown::default();
        for (rule, re, points) in &self.message_rules {
            if re.is_match(message) {
                b.add(rule, *points);
            }
        }
        b
    }

    fn score_files(&self, root: &Path, changes: &ChangeSet) -> FileKarma {
        let mut karma = FileKarma::default();
        if any_match(&self.tests, changes) {
            karma.files.add("includes_tests", 3);
        }
        if any_match(&self.docs, changes) {
            karma.files.add("includes_docs", 2);
        }
        if changes.len() > TOO_MANY_FILES {
            karma.files.add("too_many_files", -2);
        }

        for rel in changes.iter() {
            let Some(content) = read_text(&root.join(rel)) else {
                continue;
            };
            for (rule, re, points) in &self.code_rules {
                if !re.is_match(&content) {
                    karma.code.add(rule, *points);
                }
            }
        }
        karma
    }
}

fn any_match(re: &Option<Regex>, changes: &ChangeSet) -> bool {
    re.as_ref().is_some_and(|re| changes.iter().any(|p| re.is_match(p)))
}

fn read_text(path: &Path) -> Option<String> {
    let rel = path.to_string_lossy();
    if extension(&rel).is_some_and(|e| BINARY_EXTENSIONS.contains(&e.as_str())) {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl Plugin for CommitKarmaPlugin {
    fn name(&self) -> &str {
        "commit_karma"
    }

    async fn pre_commit(
        &self,
        ctx: &HookContext<'_>,
        changes: &ChangeSet,
    ) -> anyhow::Result<Option<PluginState>> {
        Ok(Some(PluginState::new(self.score_files(ctx.repo_root(), changes))))
    }

    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        commit: &CommitRecord,
        state: Option<&PluginState>,
        composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        let Some(files) = state.and_then(|s| s.downcast_ref::<FileKarma>()) else {
            return Ok(());
        };
        let message = self.score_message(&commit.message);
        let points = message.sum() + files.files.sum() + files.code.sum();

        let (total, level) = {
            let mut store = self
                .store
                .lock()
                .map_err(|_| anyhow::anyhow!("karma store lock poisoned"))?;
            let entry = KarmaEntry {
                date: commit.timestamp,
                commit: commit.hash.clone(),
                subject: commit.subject().to_string(),
                karma: points,
            };
            if let Err(e) = store.record(entry) {
                warn!(path = %store.path().display(), error = %e, "failed to save karma");
            }
            (store.total(), store.level())
        };
        info!(points, total, level = level.as_str(), "commit karma awarded");

        let mut section = format!("Commit Karma: {points} points");
        if !(message.0.is_empty() && files.files.0.is_empty() && files.code.0.is_empty()) {
            section.push_str("\nKarma Details:");
            message.render("Message", &mut section);
            files.files.render("Files", &mut section);
            files.code.render("Code", &mut section);
        }
        section.push_str(&format!(
            "\n\nTotal Karma: {total} points\nKarma Level: {}",
            level.as_str()
        ));
        composer.append_section(section);
        Ok(())
    }
}
