//! The fixed four-hook plugin contract.

use std::any::Any;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use super::compose::MessageComposer;
use crate::domain::{AutoCommitError, ChangeSet, CommitRecord};
use crate::git::Vcs;

/// Which hook is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    PreCommit,
    PostCommit,
    OnPush,
    OnError,
}

impl HookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::PreCommit => "pre_commit",
            HookStage::PostCommit => "post_commit",
            HookStage::OnPush => "on_push",
            HookStage::OnError => "on_error",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What every hook receives: the repository handle and the attempt it runs
/// in.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub vcs: &'a dyn Vcs,
    pub attempt_id: Uuid,
}

impl<'a> HookContext<'a> {
    pub fn new(vcs: &'a dyn Vcs, attempt_id: Uuid) -> Self {
        Self { vcs, attempt_id }
    }

    pub fn repo_root(&self) -> &Path {
        self.vcs.root()
    }
}

/// Plugin-private data produced by `pre_commit` and handed back to the same
/// plugin's `post_commit` in the same attempt. Dropped with the attempt.
pub struct PluginState(Box<dyn Any + Send + Sync>);

impl PluginState {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PluginState(..)")
    }
}

/// A pluggable unit implementing any subset of the four hooks.
///
/// Every hook defaults to a no-op. Errors and panics are contained by the
/// [`HookPipeline`](super::HookPipeline); they never reach the attempt.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identifier, as used in `plugins.enabled`.
    fn name(&self) -> &str;

    /// Inspect the staged changeset before the commit is created.
    async fn pre_commit(
        &self,
        _ctx: &HookContext<'_>,
        _changes: &ChangeSet,
    ) -> anyhow::Result<Option<PluginState>> {
        Ok(None)
    }

    /// Append sections to the commit message. `commit` is the commit as
    /// created; `composer` holds the message as edited by earlier plugins.
    async fn post_commit(
        &self,
        _ctx: &HookContext<'_>,
        _commit: &CommitRecord,
        _state: Option<&PluginState>,
        _composer: &mut MessageComposer,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once after a successful push.
    async fn on_push(&self, _ctx: &HookContext<'_>, _commit: &CommitRecord) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a stage of the attempt failed terminally.
    async fn on_error(&self, _ctx: &HookContext<'_>, _error: &AutoCommitError) -> anyhow::Result<()> {
        Ok(())
    }
}
