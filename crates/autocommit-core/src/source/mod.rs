//! ChangeSource: turns filesystem events and timer ticks into one serialized
//! stream of attempt requests.
//!
//! Producers only enqueue. The consumer takes one trigger at a time and
//! folds whatever else is already queued into it, so a burst of events
//! costs one attempt.

pub mod debounce;
pub mod scheduler;
pub mod watcher;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::domain::{Result, Trigger};
use crate::obs;

pub use debounce::{Debouncer, IgnoreFilter};
pub use scheduler::spawn_scheduler;
pub use watcher::{FsWatcher, WatchSettings};

pub const QUEUE_CAPACITY: usize = 64;

/// One trigger plus the number of queued triggers folded into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedTrigger {
    pub trigger: Trigger,
    pub coalesced: usize,
}

pub struct ChangeSource {
    rx: mpsc::Receiver<Trigger>,
    watcher: Option<FsWatcher>,
    scheduler: Option<JoinHandle<()>>,
}

impl ChangeSource {
    /// Start the producers enabled in `config`, watching `root`.
    ///
    /// With both producers disabled the source is immediately exhausted.
    pub fn start(config: &Config, root: &std::path::Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        let watcher = if config.file_monitoring.enabled {
            let settings = WatchSettings {
                debounce: Duration::from_secs(config.file_monitoring.debounce_seconds),
                stabilize: Duration::from_secs(config.file_monitoring.stabilize_seconds),
                ignore: IgnoreFilter::new(&config.file_monitoring.ignore_patterns),
            };
            Some(FsWatcher::spawn(root, settings, tx.clone())?)
        } else {
            None
        };

        let scheduler = if config.scheduling.enabled {
            Some(spawn_scheduler(config.schedule_interval(), tx.clone()))
        } else {
            None
        };

        Ok(Self {
            rx,
            watcher,
            scheduler,
        })
    }

    /// A source fed only through the returned sender.
    pub fn channel() -> (mpsc::Sender<Trigger>, Self) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            tx,
            Self {
                rx,
                watcher: None,
                scheduler: None,
            },
        )
    }

    /// Wait for the next trigger and drain everything queued behind it.
    ///
    /// `None` once every producer has stopped.
    pub async fn next(&mut self) -> Option<CoalescedTrigger> {
        let trigger = self.rx.recv().await?;
        obs::emit_trigger_received(&trigger);

        let mut coalesced = 0;
        while self.rx.try_recv().is_ok() {
            coalesced += 1;
        }
        if coalesced > 0 {
            obs::emit_trigger_coalesced(&trigger, coalesced);
        }
        Some(CoalescedTrigger { trigger, coalesced })
    }

    /// Stop both producers.
    pub async fn stop(mut self) {
        // Closing first unblocks a watch thread parked on a full queue.
        self.rx.close();
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = tokio::task::spawn_blocking(move || watcher.stop()).await;
        }
        info!("change source stopped");
    }
}
