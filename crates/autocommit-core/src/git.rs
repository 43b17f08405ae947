//! Git gateway: repository introspection and mutation.
//!
//! Every operation is individually fallible and reports failures as
//! [`AutoCommitError::Vcs`]. [`GitCli`] shells out to `git`; tests use the
//! in-memory [`crate::fakes::FakeVcs`].

use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::{AutoCommitError, ChangeSet, CommitRecord, Result};

/// What happened during [`Vcs::pull_then_push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub pulled: bool,
    /// Why the pull failed, when it did. The push was still attempted.
    pub pull_error: Option<String>,
}

/// Repository operations used by the orchestrator and plugins.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Working tree root.
    fn root(&self) -> &Path;

    /// Union of modified tracked paths and untracked paths.
    async fn changed_files(&self) -> Result<ChangeSet>;

    /// Stage the whole working tree, including deletions.
    async fn stage_all(&self) -> Result<()>;

    /// Commit the index. Fails when nothing is staged.
    async fn commit(&self, message: &str) -> Result<CommitRecord>;

    /// Rewrite the message of HEAD. Returns the new record (new hash).
    async fn amend_message(&self, message: &str) -> Result<CommitRecord>;

    async fn head_commit(&self) -> Result<CommitRecord>;

    /// `--stat` summary of the staged diff.
    async fn diff_summary(&self) -> Result<String>;

    /// Unstage everything, leaving the working tree untouched.
    async fn reset_index(&self) -> Result<()>;

    async fn pull(&self, remote: &str, branch: &str) -> Result<()>;

    async fn push(&self, remote: &str, branch: &str) -> Result<()>;

    /// Local commits not yet on `remote/branch`.
    async fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<usize>;

    /// Abandon a merge left half-done by a failed pull. Returns whether a
    /// merge was in progress.
    async fn abort_merge(&self) -> Result<bool>;

    /// Pull, then push even if the pull failed.
    ///
    /// A pull failure (conflict, network) is logged and recorded in the
    /// report; only the push result decides success. No retries. A
    /// conflicting merge is aborted before the push so the work tree is
    /// never left with conflict markers for the next attempt to stage.
    async fn pull_then_push(&self, remote: &str, branch: &str) -> Result<PushReport> {
        let pull_error = match self.pull(remote, branch).await {
            Ok(()) => {
                info!(remote = %remote, branch = %branch, "pulled latest changes");
                None
            }
            Err(e) => {
                warn!(remote = %remote, branch = %branch, error = %e, "pull failed, pushing anyway");
                if self.abort_merge().await? {
                    warn!(remote = %remote, branch = %branch, "aborted conflicting merge");
                }
                Some(e.to_string())
            }
        };

        self.push(remote, branch).await?;
        info!(remote = %remote, branch = %branch, "pushed to remote");

        Ok(PushReport {
            pulled: pull_error.is_none(),
            pull_error,
        })
    }
}

/// Check whether a directory is inside a non-bare git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    StdCommand::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
        .unwrap_or(false)
}

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Open the work tree containing `path`.
    ///
    /// Bare repositories and non-repositories are configuration errors.
    pub fn open(path: &Path) -> Result<Self> {
        if !is_git_repo(path) {
            return Err(AutoCommitError::config(format!(
                "not a git work tree (or bare repository): {}",
                path.display()
            )));
        }

        let output = StdCommand::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| AutoCommitError::config(format!("failed to run git: {e}")))?;
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || top.is_empty() {
            return Err(AutoCommitError::config(format!(
                "cannot resolve work tree root for {}",
                path.display()
            )));
        }

        Ok(Self {
            root: PathBuf::from(top),
        })
    }

    async fn git(&self, operation: &str, args: &[&str]) -> Result<String> {
        debug!(operation = %operation, args = ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AutoCommitError::vcs(operation, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let detail = if stderr.is_empty() { stdout } else { stderr };
            return Err(AutoCommitError::vcs(operation, detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn merge_in_progress(&self) -> bool {
        self.git("rev-parse", &["rev-parse", "-q", "--verify", "MERGE_HEAD"])
            .await
            .is_ok()
    }
}

fn split_nul(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\0').filter(|s| !s.is_empty())
}

fn parse_head(raw: &str) -> Result<CommitRecord> {
    let mut parts = raw.splitn(4, '\0');
    let (Some(hash), Some(author), Some(date), Some(message)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AutoCommitError::vcs("log", format!("unexpected log output: {raw:?}")));
    };

    let timestamp = DateTime::parse_from_rfc3339(date.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| AutoCommitError::vcs("log", format!("bad commit date '{date}': {e}")))?;

    Ok(CommitRecord {
        hash: hash.trim().to_string(),
        message: message.trim_end().to_string(),
        author: author.to_string(),
        timestamp,
    })
}

#[async_trait]
impl Vcs for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn changed_files(&self) -> Result<ChangeSet> {
        let mut changes = ChangeSet::new();

        let unstaged = self.git("diff", &["diff", "--name-only", "-z"]).await?;
        let staged = self
            .git("diff", &["diff", "--cached", "--name-only", "-z"])
            .await?;
        let untracked = self
            .git(
                "ls-files",
                &["ls-files", "--others", "--exclude-standard", "-z"],
            )
            .await?;

        for path in split_nul(&unstaged)
            .chain(split_nul(&staged))
            .chain(split_nul(&untracked))
        {
            changes.insert(path);
        }
        Ok(changes)
    }

    async fn stage_all(&self) -> Result<()> {
        if self.merge_in_progress().await {
            return Err(AutoCommitError::vcs(
                "add",
                "a merge is in progress; resolve or abort it before committing",
            ));
        }
        self.git("add", &["add", "--all"]).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<CommitRecord> {
        self.git("commit", &["commit", "-q", "-m", message]).await?;
        self.head_commit().await
    }

    async fn amend_message(&self, message: &str) -> Result<CommitRecord> {
        self.git("amend", &["commit", "-q", "--amend", "-m", message])
            .await?;
        self.head_commit().await
    }

    async fn head_commit(&self) -> Result<CommitRecord> {
        let raw = self
            .git("log", &["log", "-1", "--format=%H%x00%an <%ae>%x00%cI%x00%B"])
            .await?;
        parse_head(&raw)
    }

    async fn diff_summary(&self) -> Result<String> {
        self.git("diff", &["diff", "--staged", "--stat"]).await
    }

    async fn reset_index(&self) -> Result<()> {
        self.git("reset", &["reset", "-q"]).await.map(|_| ())
    }

    async fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.git("pull", &["pull", "--no-rebase", "--no-edit", remote, branch])
            .await
            .map(|_| ())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.git("push", &["push", remote, branch]).await.map(|_| ())
    }

    async fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<usize> {
        let range = format!("{remote}/{branch}..HEAD");
        let raw = match self.git("rev-list", &["rev-list", "--count", &range]).await {
            Ok(raw) => raw,
            Err(e) => {
                // No `remote/branch` yet: count what no ref of the remote has.
                debug!(error = %e, "remote branch missing, counting against all remote refs");
                let remotes = format!("--remotes={remote}");
                self.git("rev-list", &["rev-list", "--count", "HEAD", "--not", &remotes])
                    .await?
            }
        };
        raw.trim()
            .parse()
            .map_err(|e| AutoCommitError::vcs("rev-list", format!("bad count '{}': {e}", raw.trim())))
    }

    async fn abort_merge(&self) -> Result<bool> {
        if !self.merge_in_progress().await {
            return Ok(false);
        }
        self.git("merge", &["merge", "--abort"]).await?;
        Ok(true)
    }
}
