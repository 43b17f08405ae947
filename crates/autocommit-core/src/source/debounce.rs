//! Per-path debouncing and ignore-pattern filtering for filesystem events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Paths inside the repository's own metadata directory never trigger.
const GIT_DIR_MARKER: &str = ".git/";

/// Substring filter over event paths.
///
/// Each configured pattern has its `*` wildcards removed and is matched as a
/// plain substring, so `*.swp` ignores anything containing `.swp`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    needles: Vec<String>,
}

impl IgnoreFilter {
    pub fn new(patterns: &[String]) -> Self {
        let needles = patterns
            .iter()
            .map(|p| p.replace('*', ""))
            .filter(|p| !p.is_empty())
            .collect();
        Self { needles }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let raw = path.to_string_lossy();
        let normalized = raw.replace('\\', "/");
        if normalized.contains(GIT_DIR_MARKER) || normalized.ends_with("/.git") {
            return true;
        }
        self.needles.iter().any(|n| normalized.contains(n.as_str()))
    }
}

/// Suppresses an event for a path if that path last fired less than
/// `window` ago. Suppressed events do not extend the window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_fired: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    /// Record an event for `path` at `now`; true if it should fire.
    pub fn should_fire(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last_fired.get(path) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_fired.insert(path.to_path_buf(), now);
        true
    }

    /// Forget paths whose window has long expired.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_fired
            .retain(|_, last| now.saturating_duration_since(*last) < window);
    }

    pub fn tracked(&self) -> usize {
        self.last_fired.len()
    }
}
