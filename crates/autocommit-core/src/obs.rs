//! Structured observability hooks for commit attempt lifecycle events.
//!
//! This module provides:
//! - The attempt-scoped tracing span the orchestrator instruments with
//! - One emission function per lifecycle event
//!
//! Every event carries an `event = "..."` field so log pipelines can filter
//! on it regardless of the message text.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AttemptOutcome, AttemptState, SecurityViolation, Severity, Trigger};

/// The span every record of one attempt is nested in.
pub fn attempt_span(attempt_id: Uuid) -> tracing::Span {
    tracing::info_span!("autocommit.attempt", attempt_id = %attempt_id)
}

pub fn emit_trigger_received(trigger: &Trigger) {
    info!(
        event = "trigger.received",
        source = trigger.source.as_str(),
        path = ?trigger.path,
    );
}

/// Emit event: triggers that arrived while waiting were folded into one.
pub fn emit_trigger_coalesced(kept: &Trigger, dropped: usize) {
    info!(
        event = "trigger.coalesced",
        source = kept.source.as_str(),
        dropped = dropped,
    );
}

pub fn emit_attempt_started(attempt_id: Uuid, trigger: &Trigger) {
    info!(
        event = "attempt.started",
        attempt_id = %attempt_id,
        source = trigger.source.as_str(),
    );
}

pub fn emit_attempt_transition(attempt_id: Uuid, from: AttemptState, to: AttemptState) {
    tracing::debug!(
        event = "attempt.transition",
        attempt_id = %attempt_id,
        from = from.as_str(),
        to = to.as_str(),
    );
}

/// Emit event: attempt reached a terminal outcome.
pub fn emit_attempt_finished(
    attempt_id: Uuid,
    outcome: AttemptOutcome,
    reason: &str,
    commit: Option<&str>,
    duration_ms: u64,
) {
    info!(
        event = "attempt.finished",
        attempt_id = %attempt_id,
        outcome = outcome.as_str(),
        reason = %reason,
        commit = commit,
        duration_ms = duration_ms,
    );
}

/// Emit event: security finding. High severity is logged at `warn!`.
pub fn emit_security_violation(attempt_id: Uuid, violation: &SecurityViolation) {
    match violation.severity {
        Severity::High => warn!(
            event = "security.violation",
            attempt_id = %attempt_id,
            file = %violation.file,
            severity = "high",
            detail = %violation.detail,
        ),
        Severity::Medium => warn!(
            event = "security.violation",
            attempt_id = %attempt_id,
            file = %violation.file,
            severity = "medium",
            detail = %violation.detail,
        ),
    }
}

pub fn emit_hook_failed(plugin: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "hook.failed", plugin = %plugin, stage = %stage, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_span_carries_name() {
        let span = attempt_span(Uuid::new_v4());
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "autocommit.attempt");
        }
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let id = Uuid::new_v4();
        let trigger = Trigger::timer();
        emit_trigger_received(&trigger);
        emit_trigger_coalesced(&trigger, 3);
        emit_attempt_started(id, &trigger);
        emit_attempt_transition(id, AttemptState::Idle, AttemptState::Evaluating);
        emit_attempt_finished(id, AttemptOutcome::Skipped, "no changes", None, 1);
        emit_hook_failed("commit_karma", "post_commit", &"boom");
    }
}
