//! Scans changed source files line by line for common smells and lists what
//! it found in a "Code Quality Notes" section.

use std::path::Path;

use async_trait::async_trait;
use autocommit_core::{ChangeSet, CommitRecord, HookContext, MessageComposer, Plugin, PluginState};
use regex::Regex;
use tracing::debug;

use crate::extension;

const CODE_EXTENSIONS: &[&str] = &[
    ".rs", ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".c", ".cpp", ".go", ".rb", ".php",
];

/// Label, pattern, note. Matched against single lines.
const RULES: &[(&str, &str, &str)] = &[
    (
        "Complexity",
        r"\bfor\s+.*\s+for\s+.*\s+for\s+",
        "High complexity detected (nested loops)",
    ),
    ("Magic Numbers", r"\b\d{4,}\b", "Magic number detected"),
    (
        "Hardcoded Strings",
        r#""[^"]{50,}""#,
        "Long hardcoded string detected",
    ),
    (
        "Commented Code",
        r"(#|//)\s*(if|for|while|def|fn|class)\s+",
        "Commented code detected",
    ),
    ("Todo", r"(#|//)\s*(TODO|FIXME|XXX)", "TODO comment detected"),
];

const EXAMPLES_PER_RULE: usize = 3;

/// Messages with more lines than this are left alone.
const MAX_LINES_TO_ENHANCE: usize = 2;

/// Files bigger than this are not scanned.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub file: String,
    pub line: usize,
}

/// Findings per rule, in rule order; rules without findings are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityReport {
    pub issues: Vec<(&'static str, &'static str, Vec<Finding>)>,
}

impl QualityReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn render(&self) -> String {
        let mut lines = vec!["Code Quality Notes:".to_string()];
        for (label, note, findings) in &self.issues {
            let noun = if findings.len() == 1 { "issue" } else { "issues" };
            lines.push(format!("- {label}: {} {noun}", findings.len()));
            for f in findings.iter().take(EXAMPLES_PER_RULE) {
                lines.push(format!("  - {}:{} - {note}", f.file, f.line));
            }
            if findings.len() > EXAMPLES_PER_RULE {
                lines.push(format!(
                    "  - ... and {} more",
                    findings.len() - EXAMPLES_PER_RULE
                ));
            }
        }
        lines.join("\n")
    }
}

pub struct CodeQualityNotesPlugin {
    rules: Vec<(&'static str, Regex, &'static str)>,
}

impl CodeQualityNotesPlugin {
    pub fn new() -> Self {
        Self {
            rules: RULES
                .iter()
                .filter_map(|(label, pattern, note)| {
                    Regex::new(pattern).ok().map(|re| (*label, re, *note))
                })
                .collect(),
        }
    }

    pub fn scan(&self, root: &Path, changes: &ChangeSet) -> QualityReport {
        let mut found: Vec<Vec<Finding>> = vec![Vec::new(); self.rules.len()];
        for rel in changes.iter() {
            if !extension(rel).is_some_and(|e| CODE_EXTENSIONS.contains(&e.as_str())) {
                continue;
            }
            let Some(content) = read_source(&root.join(rel)) else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                for (slot, (_, re, _)) in found.iter_mut().zip(&self.rules) {
                    if re.is_match(line) {
                        slot.push(Finding {
                            file: rel.to_string(),
                            line: idx + 1,
                        });
                    }
                }
            }
        }

        QualityReport {
            issues: self
                .rules
                .iter()
                .zip(found)
                .filter(|(_, findings)| !findings.is_empty())
                .map(|((label, _, note), findings)| (*label, *note, findings))
                .collect(),
        }
    }
}

impl Default for CodeQualityNotesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Deleted, unreadable and oversized files yield nothing.
fn read_source(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > MAX_FILE_BYTES {
        debug!(path = %path.display(), "skipping file for quality scan");
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl Plugin for CodeQualityNotesPlugin {
    fn name(&self) -> &str {
        "code_quality_notes"
    }

    async fn pre_commit(
        &self,
        ctx: &HookContext<'_>,
        changes: &ChangeSet,
    ) -> anyhow::Result<Option<PluginState>> {
        let report = self.scan(ctx.repo_root(), changes);
        Ok((!report.is_empty()).then(|| PluginState::new(report)))
    }

    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        _commit: &CommitRecord,
        state: Option<&PluginState>,
        composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        let Some(report) = state.and_then(|s| s.downcast_ref::<QualityReport>()) else {
            return Ok(());
        };
        if composer.current().lines().count() > MAX_LINES_TO_ENHANCE {
            return Ok(());
        }
        composer.append_section(report.render());
        Ok(())
    }
}
