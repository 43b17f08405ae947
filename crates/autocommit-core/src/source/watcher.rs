//! Filesystem producer.
//!
//! `notify` delivers raw events into a std channel drained by a dedicated
//! thread. The thread filters, debounces, waits for the writer to settle and
//! only then enqueues a [`Trigger`]. It never touches the repository.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::debounce::{Debouncer, IgnoreFilter};
use crate::domain::{AutoCommitError, Result, Trigger};

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub debounce: Duration,
    pub stabilize: Duration,
    pub ignore: IgnoreFilter,
}

pub struct FsWatcher {
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl FsWatcher {
    /// Watch `root` recursively and feed debounced triggers into `tx`.
    pub fn spawn(root: &Path, settings: WatchSettings, tx: mpsc::Sender<Trigger>) -> Result<Self> {
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let thread = std::thread::Builder::new()
            .name("autocommit-watch".to_string())
            .spawn(move || watch_loop(raw_rx, settings, tx))
            .map_err(|e| AutoCommitError::Watcher(format!("spawn watch thread: {e}")))?;

        info!(root = %root.display(), "file monitoring started");
        Ok(Self {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }

    /// Stop watching and wait for the delivery thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the watcher closes the raw channel, which ends the thread.
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("watch thread panicked");
            }
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch_loop(
    raw_rx: std_mpsc::Receiver<notify::Result<Event>>,
    settings: WatchSettings,
    tx: mpsc::Sender<Trigger>,
) {
    let mut debouncer = Debouncer::new(settings.debounce);
    while let Ok(first) = raw_rx.recv() {
        // Everything already queued behind `first` settles during one wait.
        let batch = std::iter::once(first).chain(raw_rx.try_iter());
        let mut fired = Vec::new();
        for res in batch {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "watch error");
                    continue;
                }
            };
            for path in relevant_paths(&event, &settings.ignore) {
                if debouncer.should_fire(&path, Instant::now()) {
                    info!(path = %path.display(), "file change detected");
                    fired.push(path);
                }
            }
        }
        if !fired.is_empty() {
            std::thread::sleep(settings.stabilize);
            for path in fired {
                if tx.blocking_send(Trigger::filesystem(path)).is_err() {
                    debug!("trigger queue closed, stopping watch thread");
                    return;
                }
            }
        }
        debouncer.prune(Instant::now());
    }
}

/// Create and modify events on non-ignored files.
fn relevant_paths(event: &Event, ignore: &IgnoreFilter) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| !p.is_dir() && !ignore.is_ignored(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_create_and_modify_are_relevant() {
        let ignore = IgnoreFilter::new(&["*.tmp".to_string()]);
        let created = event(EventKind::Create(CreateKind::File), "/nonexistent/a.rs");
        let modified = event(EventKind::Modify(ModifyKind::Any), "/nonexistent/b.rs");
        let accessed = event(EventKind::Access(AccessKind::Any), "/nonexistent/c.rs");
        let tmp = event(EventKind::Modify(ModifyKind::Any), "/nonexistent/d.tmp");

        assert_eq!(relevant_paths(&created, &ignore).len(), 1);
        assert_eq!(relevant_paths(&modified, &ignore).len(), 1);
        assert!(relevant_paths(&accessed, &ignore).is_empty());
        assert!(relevant_paths(&tmp, &ignore).is_empty());
    }

    #[test]
    fn queued_events_share_one_stabilization_wait() {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        for name in ["a.rs", "b.rs", "c.rs", "d.rs", "e.rs"] {
            let path = format!("/nonexistent/{name}");
            raw_tx
                .send(Ok(event(EventKind::Modify(ModifyKind::Any), &path)))
                .unwrap();
        }
        drop(raw_tx);

        let (tx, mut rx) = mpsc::channel(16);
        let settings = WatchSettings {
            debounce: Duration::from_secs(5),
            stabilize: Duration::from_millis(300),
            ignore: IgnoreFilter::default(),
        };
        let started = Instant::now();
        watch_loop(raw_rx, settings, tx);
        let elapsed = started.elapsed();

        let mut fired = 0;
        while rx.try_recv().is_ok() {
            fired += 1;
        }
        assert_eq!(fired, 5);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(900), "waited {elapsed:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watcher_emits_trigger_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let settings = WatchSettings {
            debounce: Duration::from_secs(5),
            stabilize: Duration::from_millis(10),
            ignore: IgnoreFilter::default(),
        };
        let watcher = FsWatcher::spawn(dir.path(), settings, tx).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let trigger = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no trigger within timeout")
            .expect("channel closed");
        assert_eq!(trigger.source, crate::domain::TriggerSource::Filesystem);
        assert!(trigger.path.unwrap().ends_with("notes.txt"));

        tokio::task::spawn_blocking(move || watcher.stop()).await.unwrap();
    }
}
