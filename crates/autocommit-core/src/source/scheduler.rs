//! Timer producer: one trigger at startup, then one per interval.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::Trigger;

pub fn spawn_scheduler(interval: Duration, tx: mpsc::Sender<Trigger>) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "scheduled attempts enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            if tx.send(Trigger::timer()).await.is_err() {
                debug!("trigger queue closed, stopping scheduler");
                break;
            }
        }
    })
}
