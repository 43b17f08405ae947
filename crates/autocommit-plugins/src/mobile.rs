//! Pushover notifications on push and on error.

use std::time::Duration;

use async_trait::async_trait;
use autocommit_core::{AutoCommitError, CommitRecord, HookContext, Plugin};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

pub const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HIGH_PRIORITY: i8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushoverCredentials {
    pub api_key: String,
    pub user_key: String,
    pub device: Option<String>,
}

impl PushoverCredentials {
    /// Read `PUSHOVER_API_KEY`, `PUSHOVER_USER_KEY` and the optional
    /// `PUSHOVER_DEVICE`. `None` unless both keys are set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Some(Self {
            api_key: get("PUSHOVER_API_KEY")?,
            user_key: get("PUSHOVER_USER_KEY")?,
            device: get("PUSHOVER_DEVICE"),
        })
    }
}

/// Form body of one Pushover message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub token: String,
    pub user: String,
    pub title: String,
    pub message: String,
    pub priority: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

pub struct MobileIntegrationPlugin {
    credentials: Option<PushoverCredentials>,
    client: Client,
    endpoint: String,
}

impl MobileIntegrationPlugin {
    /// Without credentials every hook is a no-op.
    pub fn new(credentials: Option<PushoverCredentials>) -> Self {
        if credentials.is_none() {
            info!("Pushover keys not set, mobile notifications disabled");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            credentials,
            client,
            endpoint: PUSHOVER_URL.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    fn notification(&self, title: String, message: String, priority: i8) -> Option<Notification> {
        let creds = self.credentials.as_ref()?;
        Some(Notification {
            token: creds.api_key.clone(),
            user: creds.user_key.clone(),
            title,
            message,
            priority,
            device: creds.device.clone(),
        })
    }

    fn push_notification(&self, commit: &CommitRecord) -> Option<Notification> {
        self.notification(
            format!("Code Pushed: {}", commit.short_hash()),
            format!(
                "Author: {}\nDate: {}\n\n{}",
                commit.author,
                commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
                commit.message
            ),
            0,
        )
    }

    fn error_notification(&self, error: &AutoCommitError) -> Option<Notification> {
        self.notification(
            "Auto-Committer Error".to_string(),
            format!("An error occurred in the auto-committer:\n\n{error}"),
            HIGH_PRIORITY,
        )
    }

    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&notification)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("pushover rejected notification: {status}: {body}");
        }
        debug!(title = %notification.title, "sent mobile notification");
        Ok(())
    }
}

#[async_trait]
impl Plugin for MobileIntegrationPlugin {
    fn name(&self) -> &str {
        "mobile_integration"
    }

    async fn on_push(&self, _ctx: &HookContext<'_>, commit: &CommitRecord) -> anyhow::Result<()> {
        match self.push_notification(commit) {
            Some(n) => self.send(n).await,
            None => Ok(()),
        }
    }

    async fn on_error(&self, _ctx: &HookContext<'_>, error: &AutoCommitError) -> anyhow::Result<()> {
        match self.error_notification(error) {
            Some(n) => self.send(n).await,
            None => Ok(()),
        }
    }
}
