//! Error taxonomy for autocommit.
//!
//! Only [`AutoCommitError::Configuration`] is allowed to terminate the
//! process. Every other variant ends a single attempt (or a single plugin
//! invocation) and leaves the service ready for the next trigger.

/// Errors produced by the optional text-generation backend.
///
/// These never surface as attempt failures; the message generator degrades
/// to its template on any of them.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend call timed out after {0}s")]
    Timeout(u64),

    #[error("backend http error: {0}")]
    Http(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("backend returned an empty message")]
    EmptyResponse,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err.to_string())
    }
}

/// autocommit errors.
#[derive(Debug, thiserror::Error)]
pub enum AutoCommitError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("git {operation} failed: {detail}")]
    Vcs { operation: String, detail: String },

    #[error("plugin {plugin} failed in {stage}: {detail}")]
    Plugin {
        plugin: String,
        stage: String,
        detail: String,
    },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("watcher error: {0}")]
    Watcher(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AutoCommitError {
    pub fn vcs(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        AutoCommitError::Vcs {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        AutoCommitError::Configuration(detail.into())
    }

    /// Whether this error must abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AutoCommitError::Configuration(_))
    }
}

impl From<notify::Error> for AutoCommitError {
    fn from(err: notify::Error) -> Self {
        AutoCommitError::Watcher(err.to_string())
    }
}

/// Result type for autocommit operations.
pub type Result<T> = std::result::Result<T, AutoCommitError>;
