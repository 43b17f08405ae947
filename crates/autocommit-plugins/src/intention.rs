//! Reads the developer's intent out of the commit message and records it,
//! with a confidence, in an "Intentions" section.

use async_trait::async_trait;
use autocommit_core::{CommitRecord, HookContext, MessageComposer, Plugin, PluginState};
use regex::Regex;

use crate::compile_all;

struct IntentionRule {
    name: &'static str,
    description: &'static str,
    patterns: &'static [&'static str],
}

// Checked in order; within a rule the first matching pattern decides the
// confidence.
static RULES: &[IntentionRule] = &[
    IntentionRule {
        name: "Feature",
        description: "Adding new features or functionality",
        patterns: &[
            r"\b(add|implement|create|new)\s+.*\b(feature|functionality|capability)",
            r"^feat\b",
        ],
    },
    IntentionRule {
        name: "Bugfix",
        description: "Fixing bugs or issues",
        patterns: &[
            r"\bfix\s+.*\b(bug|issue|error|exception|problem|crash|failure|defect|flaw|vulnerability|security|leak)",
            r"^fix\b",
        ],
    },
    IntentionRule {
        name: "Refactor",
        description: "Refactoring or improving code",
        patterns: &[
            r"\b(refactor|restructure|reorgani[sz]e|cleanup|clean\s+up)",
            r"\b(improve|enhance|optimize|better)\s+.*\bcode\b",
            r"\bbetter\s+.*\b(structure|organization|design)\b",
        ],
    },
    IntentionRule {
        name: "Performance",
        description: "Improving performance or efficiency",
        patterns: &[
            r"\b(performance|optimi[sz]e|optimization|faster|efficien(t|cy))\b",
            r"\bspeed\s+up\b",
            r"\breduce\s+.*\b(time|memory|space)\b",
        ],
    },
    IntentionRule {
        name: "Security",
        description: "Improving security or fixing vulnerabilities",
        patterns: &[
            r"\b(security|vulnerability|exploit|attack|secure|protect(ion)?|defen[cs]e|defend|safety)\b",
        ],
    },
    IntentionRule {
        name: "Documentation",
        description: "Improving documentation or adding comments",
        patterns: &[
            r"\b(documentation|document|docs|readme|guide|manual|tutorial|comments?)\b",
            r"\b(explain|clarify|clarification|describe|description)\b",
        ],
    },
    IntentionRule {
        name: "Testing",
        description: "Adding or improving tests",
        patterns: &[r"\b(tests?|testing|coverage)\b"],
    },
    IntentionRule {
        name: "Dependency",
        description: "Updating or managing dependencies",
        patterns: &[
            r"\b(dependency|dependencies|deps|packages?|librar(y|ies)|frameworks?)\b",
            r"\b(update|upgrade|bump)\s+.*\b(crate|dependency|package|library|framework)",
        ],
    },
    IntentionRule {
        name: "Configuration",
        description: "Updating or managing configuration",
        patterns: &[r"\b(config|configuration|settings?|environments?|env)\b"],
    },
    IntentionRule {
        name: "Deployment",
        description: "Deploying or releasing code",
        patterns: &[
            r"\b(deploy|deployment|releases?|versions?|builds?|ci|cd)\b",
            r"\bcontinuous\s+(integration|deployment|delivery)\b",
        ],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intention {
    pub name: &'static str,
    pub description: &'static str,
    /// Percent.
    pub confidence: u8,
}

impl Intention {
    fn render(&self) -> String {
        format!("- {} ({}%): {}", self.name, self.confidence, self.description)
    }
}

/// 100 when the match opens the message, 90 anywhere in the subject line,
/// 70 in the body.
fn confidence(message: &str, re: &Regex) -> Option<u8> {
    let found = re.find(message)?;
    let subject_end = message.find('\n').unwrap_or(message.len());
    Some(if found.start() == 0 {
        100
    } else if found.start() < subject_end {
        90
    } else {
        70
    })
}

pub struct IntentionAwarePlugin {
    rules: Vec<(&'static IntentionRule, Vec<Regex>)>,
}

impl IntentionAwarePlugin {
    pub fn new() -> Self {
        Self {
            rules: RULES
                .iter()
                .map(|rule| (rule, compile_all(rule.patterns, true)))
                .collect(),
        }
    }

    pub fn analyze(&self, message: &str) -> Vec<Intention> {
        let message = message.trim();
        self.rules
            .iter()
            .filter_map(|(rule, patterns)| {
                let confidence = patterns.iter().find_map(|re| confidence(message, re))?;
                Some(Intention {
                    name: rule.name,
                    description: rule.description,
                    confidence,
                })
            })
            .collect()
    }
}

impl Default for IntentionAwarePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for IntentionAwarePlugin {
    fn name(&self) -> &str {
        "intention_aware"
    }

    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        commit: &CommitRecord,
        _state: Option<&PluginState>,
        composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        // The committed message only; sections added by earlier plugins
        // would read as intent.
        let intentions = self.analyze(&commit.message);
        if intentions.is_empty() {
            return Ok(());
        }
        let mut lines = vec!["Intentions:".to_string()];
        lines.extend(intentions.iter().map(Intention::render));
        composer.append_section(lines.join("\n"));
        Ok(())
    }
}
