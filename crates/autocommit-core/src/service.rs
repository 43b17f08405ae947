//! Long-running watch/schedule loop.
//!
//! Pulls coalesced triggers from a [`ChangeSource`] and hands each one to the
//! orchestrator, one at a time. Shutdown is only observed between attempts,
//! so an attempt in progress always reaches a terminal state first.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::{AttemptOutcome, AttemptResult};
use crate::orchestrator::CommitOrchestrator;
use crate::source::ChangeSource;

/// Outcome counts for one service run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub attempts: u64,
    pub committed: u64,
    pub skipped: u64,
    pub blocked: u64,
    pub failed: u64,
}

impl ServiceStats {
    fn record(&mut self, result: &AttemptResult) {
        self.attempts += 1;
        match result.outcome {
            AttemptOutcome::Committed => self.committed += 1,
            AttemptOutcome::Skipped => self.skipped += 1,
            AttemptOutcome::Blocked => self.blocked += 1,
            AttemptOutcome::Failed => self.failed += 1,
        }
    }
}

/// A shutdown signal flipped to `true` on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, finishing current attempt"),
            Err(e) => warn!(error = %e, "could not listen for interrupt"),
        }
        let _ = tx.send(true);
    });
    rx
}

/// Serve triggers until `shutdown` flips or every producer stops.
pub async fn run(
    orchestrator: Arc<CommitOrchestrator>,
    mut source: ChangeSource,
    mut shutdown: watch::Receiver<bool>,
) -> ServiceStats {
    let mut stats = ServiceStats::default();
    info!("autocommit service started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = source.next() => {
                let Some(next) = next else {
                    info!("all trigger producers stopped");
                    break;
                };
                let result = orchestrator.attempt(&next.trigger).await;
                stats.record(&result);
            }
        }
    }

    source.stop().await;
    info!(
        attempts = stats.attempts,
        committed = stats.committed,
        failed = stats.failed,
        "autocommit service stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::domain::Trigger;
    use crate::fakes::FakeVcs;
    use crate::gate::GatePolicy;
    use crate::hooks::HookPipeline;
    use crate::message::MessageGenerator;
    use crate::orchestrator::OrchestratorSettings;
    use crate::security::SecurityScanner;
    use std::time::Duration;

    fn orchestrator(vcs: Arc<FakeVcs>) -> Arc<CommitOrchestrator> {
        Arc::new(CommitOrchestrator::new(
            vcs,
            SecurityScanner::new(&SecurityConfig::default()).unwrap(),
            MessageGenerator::template_only(),
            HookPipeline::empty(),
            GatePolicy::default(),
            OrchestratorSettings::default(),
        ))
    }

    #[tokio::test]
    async fn serves_until_producers_stop() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs"]));
        let (tx, source) = ChangeSource::channel();
        let (_shutdown_tx, shutdown) = watch::channel(false);

        tx.send(Trigger::timer()).await.unwrap();
        drop(tx);

        let stats = run(orchestrator(vcs.clone()), source, shutdown).await;
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(vcs.call_count("push"), 1);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_attempt() {
        let vcs = Arc::new(
            FakeVcs::new("/repo")
                .with_changes(["a.rs"])
                .with_stage_delay(Duration::from_millis(200)),
        );
        let (tx, source) = ChangeSource::channel();
        let (shutdown_tx, shutdown) = watch::channel(false);

        tx.send(Trigger::timer()).await.unwrap();
        let service = tokio::spawn(run(orchestrator(vcs.clone()), source, shutdown));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let stats = service.await.unwrap();
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.committed, 1, "attempt completed despite shutdown");
        assert!(vcs.head().is_some());
        drop(tx);
    }

    #[tokio::test]
    async fn already_shut_down_runs_nothing() {
        let vcs = Arc::new(FakeVcs::new("/repo").with_changes(["a.rs"]));
        let (tx, source) = ChangeSource::channel();
        let (_shutdown_tx, shutdown) = watch::channel(true);
        tx.send(Trigger::timer()).await.unwrap();

        let stats = run(orchestrator(vcs.clone()), source, shutdown).await;
        assert_eq!(stats.attempts, 0);
        assert!(vcs.calls().is_empty());
    }
}
