//! In-memory fakes (testing only)
//!
//! Provides `FakeVcs` and `ScriptedBackend`, which satisfy the `Vcs` and
//! `TextBackend` contracts without git or the network. Both record every
//! call so tests can assert on ordering, and both support failure injection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{AutoCommitError, BackendError, ChangeSet, CommitRecord, Result};
use crate::git::Vcs;
use crate::message::TextBackend;

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RepoState {
    changes: ChangeSet,
    staged: bool,
    head: Option<CommitRecord>,
    next_hash: u64,
    unpushed: usize,
    merging: bool,
    conflict_on_pull: bool,
    calls: Vec<String>,
}

/// In-memory repository.
///
/// Operation names used in the call log and by [`FakeVcs::fail_on`]:
/// `changed_files`, `stage_all`, `commit`, `amend`, `head`, `diff`, `reset`,
/// `pull`, `push`, `unpushed`, `abort_merge`.
#[derive(Debug)]
pub struct FakeVcs {
    root: PathBuf,
    state: Mutex<RepoState>,
    failures: Mutex<HashSet<String>>,
    stage_delay: Option<Duration>,
}

impl FakeVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(RepoState::default()),
            failures: Mutex::new(HashSet::new()),
            stage_delay: None,
        }
    }

    pub fn with_changes<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().unwrap().changes = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Make `stage_all` sleep before completing.
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = Some(delay);
        self
    }

    pub fn with_unpushed(self, count: usize) -> Self {
        self.state.lock().unwrap().unpushed = count;
        self
    }

    /// Make every later call of `operation` fail.
    pub fn fail_on(&self, operation: &str) {
        self.failures.lock().unwrap().insert(operation.to_string());
    }

    /// Make every later `pull` fail and leave a merge in progress, the way
    /// a conflicting `git pull` does.
    pub fn conflict_on_pull(&self) {
        self.state.lock().unwrap().conflict_on_pull = true;
    }

    pub fn merging(&self) -> bool {
        self.state.lock().unwrap().merging
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    pub fn head(&self) -> Option<CommitRecord> {
        self.state.lock().unwrap().head.clone()
    }

    pub fn unpushed(&self) -> usize {
        self.state.lock().unwrap().unpushed
    }

    fn enter(&self, operation: &str) -> Result<()> {
        self.state.lock().unwrap().calls.push(operation.to_string());
        if self.failures.lock().unwrap().contains(operation) {
            return Err(AutoCommitError::vcs(operation, "injected failure"));
        }
        Ok(())
    }

    fn record(state: &mut RepoState, message: &str) -> CommitRecord {
        state.next_hash += 1;
        CommitRecord {
            hash: format!("{:040x}", state.next_hash),
            message: message.to_string(),
            author: "fake <fake@example.com>".to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn changed_files(&self) -> Result<ChangeSet> {
        self.enter("changed_files")?;
        Ok(self.state.lock().unwrap().changes.clone())
    }

    async fn stage_all(&self) -> Result<()> {
        self.enter("stage_all")?;
        if self.state.lock().unwrap().merging {
            return Err(AutoCommitError::vcs("add", "a merge is in progress"));
        }
        if let Some(delay) = self.stage_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.staged = !state.changes.is_empty();
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<CommitRecord> {
        self.enter("commit")?;
        let mut state = self.state.lock().unwrap();
        if !state.staged {
            return Err(AutoCommitError::vcs("commit", "nothing to commit"));
        }
        let record = Self::record(&mut state, message);
        state.head = Some(record.clone());
        state.changes = ChangeSet::new();
        state.staged = false;
        state.unpushed += 1;
        Ok(record)
    }

    async fn amend_message(&self, message: &str) -> Result<CommitRecord> {
        self.enter("amend")?;
        let mut state = self.state.lock().unwrap();
        if state.head.is_none() {
            return Err(AutoCommitError::vcs("amend", "no commit to amend"));
        }
        let record = Self::record(&mut state, message);
        state.head = Some(record.clone());
        Ok(record)
    }

    async fn head_commit(&self) -> Result<CommitRecord> {
        self.enter("head")?;
        self.state
            .lock()
            .unwrap()
            .head
            .clone()
            .ok_or_else(|| AutoCommitError::vcs("log", "no commits yet"))
    }

    async fn diff_summary(&self) -> Result<String> {
        self.enter("diff")?;
        let state = self.state.lock().unwrap();
        let lines: Vec<String> = state.changes.iter().map(|p| format!(" {p} | 1 +")).collect();
        Ok(lines.join("\n"))
    }

    async fn reset_index(&self) -> Result<()> {
        self.enter("reset")?;
        self.state.lock().unwrap().staged = false;
        Ok(())
    }

    async fn pull(&self, _remote: &str, _branch: &str) -> Result<()> {
        self.enter("pull")?;
        let mut state = self.state.lock().unwrap();
        if state.conflict_on_pull {
            state.merging = true;
            return Err(AutoCommitError::vcs("pull", "merge conflict in one.txt"));
        }
        Ok(())
    }

    async fn push(&self, _remote: &str, _branch: &str) -> Result<()> {
        self.enter("push")?;
        self.state.lock().unwrap().unpushed = 0;
        Ok(())
    }

    async fn unpushed_commits(&self, _remote: &str, _branch: &str) -> Result<usize> {
        self.enter("unpushed")?;
        Ok(self.state.lock().unwrap().unpushed)
    }

    async fn abort_merge(&self) -> Result<bool> {
        self.enter("abort_merge")?;
        let mut state = self.state.lock().unwrap();
        Ok(std::mem::take(&mut state.merging))
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend
// ---------------------------------------------------------------------------

/// Text backend returning a fixed reply (or error) after an optional delay.
#[derive(Debug)]
pub struct ScriptedBackend {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(BackendError::Http)
    }
}
