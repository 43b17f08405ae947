//! Commit gate rules engine.
//!
//! Evaluates a [`ChangeSet`] at a given local time against a [`GatePolicy`]
//! to produce a [`GateVerdict`], the go/no-go decision taken before any
//! repository mutation. Pure and deterministic: no clock reads, no I/O.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::domain::{AutoCommitError, ChangeSet, Result};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A local time-of-day window during which no attempt may proceed.
///
/// `start > end` means the window wraps past midnight. Both ends are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` or `HH:MM:SS` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        })
    }

    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|e| AutoCommitError::config(format!("invalid time of day '{raw}': {e}")))
}

/// Thresholds and windows that can block an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub quiet_hours: Option<QuietHours>,
    pub min_files: usize,
    pub max_files: usize,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            quiet_hours: None,
            min_files: 1,
            max_files: 50,
        }
    }
}

impl GatePolicy {
    pub fn with_quiet_hours(mut self, quiet_hours: QuietHours) -> Self {
        self.quiet_hours = Some(quiet_hours);
        self
    }

    pub fn with_limits(mut self, min_files: usize, max_files: usize) -> Self {
        self.min_files = min_files;
        self.max_files = max_files;
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The rule that rejected an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    QuietHours,
    MinFiles,
    MaxFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRejection {
    pub rule: GateRule,
    pub reason: String,
}

/// Outcome of evaluating a policy. Rejections are policy decisions, not
/// errors: the attempt is simply skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub rejection: Option<GateRejection>,
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        self.rejection.is_none()
    }

    pub fn reason(&self) -> &str {
        self.rejection
            .as_ref()
            .map(|r| r.reason.as_str())
            .unwrap_or("gate passed")
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate `changes` at local time `now` against `policy`.
///
/// Rules are checked in order quiet hours, minimum, maximum; the first
/// rejection wins.
pub fn evaluate_gate(now: NaiveTime, changes: &ChangeSet, policy: &GatePolicy) -> GateVerdict {
    let rejection = check_quiet_hours(now, policy).or_else(|| check_size(changes.len(), policy));
    GateVerdict { rejection }
}

/// Boolean form of [`evaluate_gate`].
pub fn should_attempt(now: NaiveTime, changes: &ChangeSet, policy: &GatePolicy) -> bool {
    evaluate_gate(now, changes, policy).passed()
}

fn check_quiet_hours(now: NaiveTime, policy: &GatePolicy) -> Option<GateRejection> {
    let window = policy.quiet_hours?;
    if window.contains(now) {
        Some(GateRejection {
            rule: GateRule::QuietHours,
            reason: format!(
                "quiet hours {}-{} (now {})",
                window.start.format("%H:%M"),
                window.end.format("%H:%M"),
                now.format("%H:%M:%S"),
            ),
        })
    } else {
        None
    }
}

fn check_size(count: usize, policy: &GatePolicy) -> Option<GateRejection> {
    if count < policy.min_files {
        Some(GateRejection {
            rule: GateRule::MinFiles,
            reason: format!("not enough files changed ({count} < {})", policy.min_files),
        })
    } else if count > policy.max_files {
        Some(GateRejection {
            rule: GateRule::MaxFiles,
            reason: format!("too many files changed ({count} > {})", policy.max_files),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn changes(n: usize) -> ChangeSet {
        (0..n).map(|i| format!("file_{i}.rs")).collect()
    }

    #[test]
    fn test_size_thresholds_independent_of_time() {
        let policy = GatePolicy::default().with_limits(2, 4);
        for hour in [0, 6, 12, 23] {
            let now = t(hour, 15);
            assert!(!should_attempt(now, &changes(0), &policy));
            assert!(!should_attempt(now, &changes(1), &policy));
            assert!(should_attempt(now, &changes(2), &policy));
            assert!(should_attempt(now, &changes(4), &policy));
            assert!(!should_attempt(now, &changes(5), &policy));
        }
    }

    #[test]
    fn test_default_thresholds() {
        let policy = GatePolicy::default();
        assert!(should_attempt(t(12, 0), &changes(1), &policy));
        assert!(should_attempt(t(12, 0), &changes(50), &policy));

        let verdict = evaluate_gate(t(12, 0), &changes(51), &policy);
        assert!(!verdict.passed());
        assert_eq!(verdict.rejection.unwrap().rule, GateRule::MaxFiles);
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let policy = GatePolicy::default().with_quiet_hours(QuietHours::new(t(12, 0), t(13, 0)));
        assert!(!should_attempt(t(12, 0), &changes(1), &policy));
        assert!(!should_attempt(t(12, 30), &changes(1), &policy));
        assert!(!should_attempt(t(13, 0), &changes(1), &policy));
        assert!(should_attempt(t(11, 59), &changes(1), &policy));
        assert!(should_attempt(t(13, 1), &changes(1), &policy));
    }

    #[test]
    fn test_quiet_hours_wrapping_midnight() {
        let window = QuietHours::parse("22:00", "06:00").unwrap();
        let policy = GatePolicy::default().with_quiet_hours(window);

        assert!(!should_attempt(t(23, 30), &changes(1), &policy));
        assert!(!should_attempt(t(2, 0), &changes(1), &policy));
        assert!(!should_attempt(t(22, 0), &changes(1), &policy));
        assert!(!should_attempt(t(6, 0), &changes(1), &policy));
        assert!(should_attempt(t(12, 0), &changes(1), &policy));
        assert!(should_attempt(t(21, 59), &changes(1), &policy));

        let verdict = evaluate_gate(t(2, 0), &changes(1), &policy);
        assert_eq!(verdict.rejection.unwrap().rule, GateRule::QuietHours);
    }

    #[test]
    fn test_quiet_hours_take_precedence_over_size() {
        let policy = GatePolicy::default().with_quiet_hours(QuietHours::new(t(0, 0), t(23, 59)));
        let verdict = evaluate_gate(t(10, 0), &changes(100), &policy);
        assert_eq!(verdict.rejection.unwrap().rule, GateRule::QuietHours);
    }

    #[test]
    fn test_parse_accepts_seconds_and_rejects_garbage() {
        let q = QuietHours::parse("22:00:30", " 06:00 ").unwrap();
        assert_eq!(q.start, NaiveTime::from_hms_opt(22, 0, 30).unwrap());
        assert_eq!(q.end, t(6, 0));
        assert!(QuietHours::parse("late", "06:00").is_err());
    }

    #[test]
    fn test_verdict_reason() {
        let policy = GatePolicy::default();
        assert_eq!(evaluate_gate(t(9, 0), &changes(3), &policy).reason(), "gate passed");
        assert!(evaluate_gate(t(9, 0), &changes(0), &policy)
            .reason()
            .contains("not enough files"));
    }
}
