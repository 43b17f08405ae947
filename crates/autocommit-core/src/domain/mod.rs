//! Domain models for autocommit.
//!
//! Canonical definitions for the core entities:
//! - `Trigger`: a request for one attempt
//! - `ChangeSet`: dirty and untracked paths at attempt time
//! - `CommitRecord`: a commit produced by an attempt
//! - `AttemptResult`: the terminal value of one orchestrator run

pub mod attempt;
pub mod change;
pub mod error;

pub use attempt::{
    AttemptOutcome, AttemptResult, AttemptState, CommitRecord, SecurityViolation, Severity,
    ViolationKind,
};
pub use change::{ChangeSet, Trigger, TriggerSource};
pub use error::{AutoCommitError, BackendError, Result};
