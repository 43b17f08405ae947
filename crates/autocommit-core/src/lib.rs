//! autocommit core library
//!
//! The commit-orchestration engine: triggers in, at most one commit attempt
//! at a time, policy gates and a security pre-flight before any mutation,
//! plugin hooks around the commit, and a pull-then-push exchange at the end.

pub mod config;
pub mod domain;
pub mod fakes;
pub mod gate;
pub mod git;
pub mod hooks;
pub mod message;
pub mod obs;
pub mod orchestrator;
pub mod security;
pub mod service;
pub mod source;
pub mod telemetry;

pub use config::{Config, DEFAULT_CONFIG_PATH};

pub use domain::{
    AttemptOutcome, AttemptResult, AttemptState, AutoCommitError, BackendError, ChangeSet,
    CommitRecord, Result, SecurityViolation, Severity, Trigger, TriggerSource, ViolationKind,
};

pub use gate::{evaluate_gate, should_attempt, GatePolicy, GateRule, GateVerdict, QuietHours};

pub use git::{is_git_repo, GitCli, PushReport, Vcs};

pub use hooks::{HookContext, HookPipeline, HookStage, MessageComposer, Plugin, PluginState};

pub use message::{template_message, MessageGenerator, OpenAiBackend, TextBackend};

pub use orchestrator::{CommitOrchestrator, OrchestratorSettings};

pub use security::{ScanReport, SecurityScanner};

pub use service::ServiceStats;

pub use source::{ChangeSource, CoalescedTrigger};
