//! Commit records and attempt results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A commit created by an attempt.
///
/// The hash is only final after the post-commit hook chain: an amend
/// produces a new hash and the record is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    /// First 8 hex chars of the hash.
    pub fn short_hash(&self) -> &str {
        &self.hash[..8.min(self.hash.len())]
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Orchestrator states visited by an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Evaluating,
    Scanning,
    Staging,
    Committing,
    Hooking,
    Pushing,
    Blocked,
    Failed,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::Evaluating => "evaluating",
            AttemptState::Scanning => "scanning",
            AttemptState::Staging => "staging",
            AttemptState::Committing => "committing",
            AttemptState::Hooking => "hooking",
            AttemptState::Pushing => "pushing",
            AttemptState::Blocked => "blocked",
            AttemptState::Failed => "failed",
        }
    }
}

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// A commit was created (and pushed, when pushing is enabled).
    Committed,
    /// Nothing to do, a policy gate said no, or another attempt was running.
    Skipped,
    /// The security scan vetoed the changeset before any mutation.
    Blocked,
    /// A git operation failed.
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Committed => "committed",
            AttemptOutcome::Skipped => "skipped",
            AttemptOutcome::Blocked => "blocked",
            AttemptOutcome::Failed => "failed",
        }
    }
}

/// Security finding for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityViolation {
    pub file: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BlockedExtension,
    PotentialSecret,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::BlockedExtension => "blocked_extension",
            ViolationKind::PotentialSecret => "potential_secret",
        }
    }
}

/// Violation severity. Only `High` blocks an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

/// Value returned by one orchestrator run. Never retried within the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt_id: Uuid,
    pub outcome: AttemptOutcome,
    pub reason: String,
    pub commit: Option<CommitRecord>,
    /// States visited, in order, starting at `Idle`.
    pub states: Vec<AttemptState>,
    /// Every violation reported by the scan, blocking or not.
    pub violations: Vec<SecurityViolation>,
    pub pushed: bool,
}

impl AttemptResult {
    pub fn committed(&self) -> bool {
        self.outcome == AttemptOutcome::Committed
    }

    pub fn visited(&self, state: AttemptState) -> bool {
        self.states.contains(&state)
    }
}
