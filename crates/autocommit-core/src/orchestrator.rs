//! CommitOrchestrator: one commit attempt, start to finish.
//!
//! ```text
//! Idle → Evaluating → Scanning → Staging → Committing → Hooking → Pushing → Idle
//!             │           │          │           │                   │
//!             └──Blocked──┘          └──Failed───┘                Failed
//! ```
//!
//! Attempts are single-flight: a call to [`CommitOrchestrator::attempt`]
//! while another attempt holds the lock returns `skipped` at once without
//! touching the repository. Every failure path ends in an [`AttemptResult`];
//! nothing short of a configuration error escapes.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    AttemptOutcome, AttemptResult, AttemptState, AutoCommitError, ChangeSet, CommitRecord,
    Result, SecurityViolation, Severity, Trigger,
};
use crate::gate::{evaluate_gate, GatePolicy};
use crate::git::Vcs;
use crate::hooks::{HookContext, HookPipeline};
use crate::message::MessageGenerator;
use crate::obs;
use crate::security::SecurityScanner;

pub const REASON_IN_FLIGHT: &str = "attempt already in flight";
pub const REASON_NO_CHANGES: &str = "no changes detected";
pub const REASON_PUSHED_PENDING: &str = "pushed pending commits";

/// Repository-level switches for the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub remote: String,
    pub branch: String,
    pub auto_push: bool,
    pub retry_unpushed: bool,
    pub scan_for_secrets: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            auto_push: true,
            retry_unpushed: true,
            scan_for_secrets: true,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote: config.repository.remote.clone(),
            branch: config.repository.branch.clone(),
            auto_push: config.repository.auto_push,
            retry_unpushed: config.repository.retry_unpushed,
            scan_for_secrets: config.security.scan_for_secrets,
        }
    }
}

pub struct CommitOrchestrator {
    vcs: Arc<dyn Vcs>,
    scanner: SecurityScanner,
    messages: MessageGenerator,
    hooks: HookPipeline,
    policy: GatePolicy,
    settings: OrchestratorSettings,
    flight: Mutex<()>,
}

impl CommitOrchestrator {
    pub fn new(
        vcs: Arc<dyn Vcs>,
        scanner: SecurityScanner,
        messages: MessageGenerator,
        hooks: HookPipeline,
        policy: GatePolicy,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            vcs,
            scanner,
            messages,
            hooks,
            policy,
            settings,
            flight: Mutex::new(()),
        }
    }

    /// Wire every collaborator from a validated configuration.
    pub fn from_config(config: &Config, vcs: Arc<dyn Vcs>, hooks: HookPipeline) -> Result<Self> {
        Ok(Self::new(
            vcs,
            SecurityScanner::new(&config.security)?,
            MessageGenerator::from_config(&config.ai_integration),
            hooks,
            config.gate_policy()?,
            OrchestratorSettings::from_config(config),
        ))
    }

    /// Whether an attempt currently holds the single-flight lock.
    pub fn is_busy(&self) -> bool {
        self.flight.try_lock().is_err()
    }

    /// Run one attempt for `trigger`.
    pub async fn attempt(&self, trigger: &Trigger) -> AttemptResult {
        let mut run = AttemptRun::new();
        let Ok(_guard) = self.flight.try_lock() else {
            info!(attempt_id = %run.id, "{REASON_IN_FLIGHT}, skipping");
            return run.finish(AttemptOutcome::Skipped, REASON_IN_FLIGHT);
        };

        obs::emit_attempt_started(run.id, trigger);
        let span = obs::attempt_span(run.id);
        self.execute(&mut run, trigger).instrument(span).await
    }

    async fn execute(&self, run: &mut AttemptRun, trigger: &Trigger) -> AttemptResult {
        let ctx = HookContext::new(self.vcs.as_ref(), run.id);

        // Evaluating
        run.transition(AttemptState::Evaluating);
        let changes = match self.vcs.changed_files().await {
            Ok(changes) => changes,
            Err(e) => return self.fail(run, &ctx, e).await,
        };
        if changes.is_empty() {
            return self.without_changes(run, &ctx).await;
        }

        let now = trigger.timestamp.with_timezone(&Local).time();
        let verdict = evaluate_gate(now, &changes, &self.policy);
        if !verdict.passed() {
            info!(files = changes.len(), reason = %verdict.reason(), "gate rejected attempt");
            run.transition(AttemptState::Blocked);
            return run.finish(AttemptOutcome::Skipped, verdict.reason());
        }

        // Scanning
        run.transition(AttemptState::Scanning);
        if let Some(reason) = self.scan(run, &changes) {
            run.transition(AttemptState::Blocked);
            return run.finish(AttemptOutcome::Blocked, reason);
        }

        // Staging
        run.transition(AttemptState::Staging);
        if let Err(e) = self.vcs.stage_all().await {
            return self.fail(run, &ctx, e).await;
        }
        info!(files = changes.len(), "staged changes");
        let hook_run = self.hooks.pre_commit(&ctx, &changes).await;

        // Committing
        run.transition(AttemptState::Committing);
        let commit = match self.create_commit(&changes).await {
            Ok(commit) => commit,
            Err(e) => {
                if let Err(reset) = self.vcs.reset_index().await {
                    warn!(error = %reset, "could not unstage after failed commit");
                }
                return self.fail(run, &ctx, e).await;
            }
        };
        info!(commit = %commit.short_hash(), message = %commit.subject(), "created commit");

        // Hooking
        run.transition(AttemptState::Hooking);
        let composer = self.hooks.post_commit(&ctx, &commit, &hook_run).await;
        drop(hook_run);
        let commit = if composer.changed() {
            match self.vcs.amend_message(&composer.current()).await {
                Ok(amended) => amended,
                Err(e) => {
                    warn!(error = %e, "amending plugin sections failed, keeping original message");
                    commit
                }
            }
        } else {
            commit
        };
        run.commit = Some(commit.clone());

        if !self.settings.auto_push {
            run.transition(AttemptState::Idle);
            return run.finish(AttemptOutcome::Committed, "committed, push disabled");
        }

        // Pushing
        run.transition(AttemptState::Pushing);
        if let Err(e) = self.publish(&ctx, &commit).await {
            return self.fail(run, &ctx, e).await;
        }
        run.pushed = true;
        run.transition(AttemptState::Idle);
        run.finish(AttemptOutcome::Committed, "committed and pushed")
    }

    /// Security pre-flight. Returns the block reason, if any.
    fn scan(&self, run: &mut AttemptRun, changes: &ChangeSet) -> Option<String> {
        if !self.settings.scan_for_secrets {
            return None;
        }
        let report = self.scanner.is_safe_to_commit(self.vcs.root(), changes);
        for violation in &report.violations {
            obs::emit_security_violation(run.id, violation);
        }
        let high = report
            .violations
            .iter()
            .filter(|v| v.severity == Severity::High)
            .count();
        run.violations = report.violations;
        if report.safe {
            None
        } else {
            Some(format!("security scan found {high} high-severity violation(s)"))
        }
    }

    async fn create_commit(&self, changes: &ChangeSet) -> Result<CommitRecord> {
        let diff = match self.vcs.diff_summary().await {
            Ok(diff) => diff,
            Err(e) => {
                warn!(error = %e, "could not read staged diff");
                String::new()
            }
        };
        let message = self.messages.generate(changes, &diff).await;
        self.vcs.commit(&message).await
    }

    async fn publish(&self, ctx: &HookContext<'_>, commit: &CommitRecord) -> Result<()> {
        let report = self
            .vcs
            .pull_then_push(&self.settings.remote, &self.settings.branch)
            .await?;
        info!(
            remote = %self.settings.remote,
            branch = %self.settings.branch,
            pulled = report.pulled,
            "pushed to remote"
        );
        self.hooks.on_push(ctx, commit).await;
        Ok(())
    }

    /// Nothing to commit: optionally push commits a previous attempt left
    /// behind.
    async fn without_changes(&self, run: &mut AttemptRun, ctx: &HookContext<'_>) -> AttemptResult {
        if self.settings.auto_push && self.settings.retry_unpushed {
            let pending = match self
                .vcs
                .unpushed_commits(&self.settings.remote, &self.settings.branch)
                .await
            {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "could not count unpushed commits");
                    0
                }
            };
            if pending > 0 {
                info!(pending, "retrying push of pending commits");
                run.transition(AttemptState::Pushing);
                let head = match self.vcs.head_commit().await {
                    Ok(head) => head,
                    Err(e) => return self.fail(run, ctx, e).await,
                };
                if let Err(e) = self.publish(ctx, &head).await {
                    return self.fail(run, ctx, e).await;
                }
                run.pushed = true;
                run.transition(AttemptState::Idle);
                return run.finish(AttemptOutcome::Skipped, REASON_PUSHED_PENDING);
            }
        }
        run.transition(AttemptState::Blocked);
        run.finish(AttemptOutcome::Skipped, REASON_NO_CHANGES)
    }

    async fn fail(
        &self,
        run: &mut AttemptRun,
        ctx: &HookContext<'_>,
        error: AutoCommitError,
    ) -> AttemptResult {
        warn!(error = %error, state = run.state.as_str(), "attempt failed");
        run.transition(AttemptState::Failed);
        self.hooks.on_error(ctx, &error).await;
        run.finish(AttemptOutcome::Failed, error.to_string())
    }
}

/// Mutable bookkeeping for one attempt.
struct AttemptRun {
    id: Uuid,
    started: Instant,
    state: AttemptState,
    states: Vec<AttemptState>,
    commit: Option<CommitRecord>,
    violations: Vec<SecurityViolation>,
    pushed: bool,
}

impl AttemptRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            state: AttemptState::Idle,
            states: vec![AttemptState::Idle],
            commit: None,
            violations: Vec::new(),
            pushed: false,
        }
    }

    fn transition(&mut self, to: AttemptState) {
        obs::emit_attempt_transition(self.id, self.state, to);
        self.state = to;
        self.states.push(to);
    }

    fn finish(&mut self, outcome: AttemptOutcome, reason: impl Into<String>) -> AttemptResult {
        let reason = reason.into();
        obs::emit_attempt_finished(
            self.id,
            outcome,
            &reason,
            self.commit.as_ref().map(|c| c.short_hash()),
            self.started.elapsed().as_millis() as u64,
        );
        AttemptResult {
            attempt_id: self.id,
            outcome,
            reason,
            commit: self.commit.take(),
            states: std::mem::take(&mut self.states),
            violations: std::mem::take(&mut self.violations),
            pushed: self.pushed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeVcs;
    use crate::gate::QuietHours;
    use chrono::{NaiveTime, TimeZone, Utc};

    fn orchestrator(
        vcs: Arc<FakeVcs>,
        policy: GatePolicy,
        settings: OrchestratorSettings,
    ) -> CommitOrchestrator {
        CommitOrchestrator::new(
            vcs,
            SecurityScanner::new(&crate::config::SecurityConfig::default()).unwrap(),
            MessageGenerator::template_only(),
            HookPipeline::empty(),
            policy,
            settings,
        )
    }

    #[tokio::test]
    async fn empty_changeset_is_skipped_without_mutation() {
        let vcs = Arc::new(FakeVcs::new("/repo"));
        let orch = orchestrator(vcs.clone(), GatePolicy::default(), OrchestratorSettings::default());

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Skipped);
        assert_eq!(result.reason, REASON_NO_CHANGES);
        assert_eq!(result.states.last(), Some(&AttemptState::Blocked));
        assert_eq!(vcs.calls(), vec!["changed_files", "unpushed"]);
    }

    #[tokio::test]
    async fn gate_rejection_skips_before_scanning() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs"]));
        let policy = GatePolicy::default().with_limits(2, 50);
        let orch = orchestrator(vcs.clone(), policy, OrchestratorSettings::default());

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Skipped);
        assert!(!result.visited(AttemptState::Scanning));
        assert_eq!(vcs.call_count("stage_all"), 0);
    }

    #[tokio::test]
    async fn quiet_hours_use_trigger_local_time() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs"]));
        let trigger = Trigger {
            timestamp: Local
                .with_ymd_and_hms(2024, 3, 1, 23, 30, 0)
                .single()
                .unwrap()
                .with_timezone(&Utc),
            ..Trigger::timer()
        };
        let quiet = QuietHours::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        let orch = orchestrator(
            vcs.clone(),
            GatePolicy::default().with_quiet_hours(quiet),
            OrchestratorSettings::default(),
        );

        let result = orch.attempt(&trigger).await;
        assert_eq!(result.outcome, AttemptOutcome::Skipped);
        assert!(result.reason.contains("quiet hours"));
    }

    #[tokio::test]
    async fn scan_disabled_skips_blocked_extension_check() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["server.key"]));
        let settings = OrchestratorSettings {
            scan_for_secrets: false,
            ..OrchestratorSettings::default()
        };
        let orch = orchestrator(vcs.clone(), GatePolicy::default(), settings);

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Committed);
        assert!(!result.visited(AttemptState::Blocked));
    }

    #[tokio::test]
    async fn push_disabled_ends_after_hooking() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs"]));
        let settings = OrchestratorSettings {
            auto_push: false,
            ..OrchestratorSettings::default()
        };
        let orch = orchestrator(vcs.clone(), GatePolicy::default(), settings);

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Committed);
        assert!(!result.pushed);
        assert!(!result.visited(AttemptState::Pushing));
        assert_eq!(vcs.call_count("push"), 0);
        assert_eq!(vcs.unpushed(), 1);
    }

    #[tokio::test]
    async fn push_failure_keeps_local_commit() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs", "b.rs"]));
        vcs.fail_on("push");
        let orch = orchestrator(vcs.clone(), GatePolicy::default(), OrchestratorSettings::default());

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Failed);
        assert!(result.commit.is_some(), "commit stays applied locally");
        assert_eq!(vcs.head().unwrap().message, "auto: update 2 files");
        assert_eq!(result.states.last(), Some(&AttemptState::Failed));
        assert_eq!(vcs.call_count("reset"), 0);
    }

    #[tokio::test]
    async fn changed_files_failure_is_failed_outcome() {
        let vcs = Arc::new(FakeVcs::new("/repo"));
        vcs.fail_on("changed_files");
        let orch = orchestrator(vcs.clone(), GatePolicy::default(), OrchestratorSettings::default());

        let result = orch.attempt(&Trigger::timer()).await;
        assert_eq!(result.outcome, AttemptOutcome::Failed);
        assert!(result.reason.contains("injected failure"));
    }

    #[tokio::test]
    async fn busy_flag_reflects_lock() {
        let vcs = Arc::new(FakeVcs::new("/repo"));
        let orch = orchestrator(vcs, GatePolicy::default(), OrchestratorSettings::default());
        assert!(!orch.is_busy());
        let _held = orch.flight.lock().await;
        assert!(orch.is_busy());
        let result = orch.attempt(&Trigger::manual()).await;
        assert_eq!(result.reason, REASON_IN_FLIGHT);
    }
}
