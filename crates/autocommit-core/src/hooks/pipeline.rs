//! Ordered plugin invocation with per-invocation fault isolation.
//!
//! Plugins run one at a time, in configured order. Each invocation is
//! wrapped individually: an `Err` or a panic is converted into an
//! [`AutoCommitError::Plugin`], logged, and dropped. Nothing a plugin does
//! can fail the attempt.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use super::compose::MessageComposer;
use super::plugin::{HookContext, HookStage, Plugin, PluginState};
use crate::domain::{AutoCommitError, ChangeSet, CommitRecord};
use crate::obs;

/// Attempt-scoped plugin state, keyed by position in the pipeline.
///
/// Created by [`HookPipeline::pre_commit`] and dropped when the attempt
/// ends, so nothing survives into the next attempt.
#[derive(Debug, Default)]
pub struct HookRun {
    states: HashMap<usize, PluginState>,
}

impl HookRun {
    pub fn state(&self, index: usize) -> Option<&PluginState> {
        self.states.get(&index)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[derive(Default)]
pub struct HookPipeline {
    plugins: Vec<Box<dyn Plugin>>,
}

impl HookPipeline {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub async fn pre_commit(&self, ctx: &HookContext<'_>, changes: &ChangeSet) -> HookRun {
        let mut run = HookRun::default();
        for (index, plugin) in self.plugins.iter().enumerate() {
            let result = guarded(
                plugin.name(),
                HookStage::PreCommit,
                plugin.pre_commit(ctx, changes),
            )
            .await;
            if let Some(Some(state)) = result {
                run.states.insert(index, state);
            }
        }
        run
    }

    /// Run every `post_commit` hook against one composer seeded with the
    /// commit's message. A failing plugin's partial sections are discarded.
    pub async fn post_commit(
        &self,
        ctx: &HookContext<'_>,
        commit: &CommitRecord,
        run: &HookRun,
    ) -> MessageComposer {
        let mut composer = MessageComposer::new(commit.message.clone());
        for (index, plugin) in self.plugins.iter().enumerate() {
            let checkpoint = composer.checkpoint();
            let ok = guarded(
                plugin.name(),
                HookStage::PostCommit,
                plugin.post_commit(ctx, commit, run.state(index), &mut composer),
            )
            .await
            .is_some();
            if !ok {
                composer.rollback(checkpoint);
            }
        }
        composer
    }

    pub async fn on_push(&self, ctx: &HookContext<'_>, commit: &CommitRecord) {
        for plugin in &self.plugins {
            guarded(plugin.name(), HookStage::OnPush, plugin.on_push(ctx, commit)).await;
        }
    }

    pub async fn on_error(&self, ctx: &HookContext<'_>, error: &AutoCommitError) {
        for plugin in &self.plugins {
            guarded(plugin.name(), HookStage::OnError, plugin.on_error(ctx, error)).await;
        }
    }
}

/// Await one hook, containing both `Err` and panics.
async fn guarded<T, F>(plugin: &str, stage: HookStage, hook: F) -> Option<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let detail = match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => format!("{e:#}"),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };
    let error = AutoCommitError::Plugin {
        plugin: plugin.to_string(),
        stage: stage.as_str().to_string(),
        detail,
    };
    obs::emit_hook_failed(plugin, stage.as_str(), &error);
    None
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
