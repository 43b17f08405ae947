//! Plugin hooks around a commit attempt.
//!
//! - [`Plugin`]: the four-hook contract (`pre_commit`, `post_commit`,
//!   `on_push`, `on_error`)
//! - [`MessageComposer`]: the in-memory message the post-commit chain edits
//! - [`HookPipeline`]: ordered, sequential invocation with per-plugin fault
//!   isolation

pub mod compose;
pub mod pipeline;
pub mod plugin;

pub use compose::{Checkpoint, MessageComposer};
pub use pipeline::{HookPipeline, HookRun};
pub use plugin::{HookContext, HookStage, Plugin, PluginState};
