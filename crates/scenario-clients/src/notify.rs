//! Notification client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientResult;
use crate::expect_success;

/// Notification event emitted when a notify-enabled rule fires
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub category: String,
    pub content: String,
    pub sender: String,
    pub severity: String,
    pub status: String,
}

impl Notification {
    /// The trigger-event notification for one fired rule
    pub fn rule_triggered(rule_name: &str, sender: &str) -> Self {
        Self {
            category: "trigger-event".to_string(),
            content: format!("automation rule '{}' triggered", rule_name),
            sender: sender.to_string(),
            severity: "NORMAL".to_string(),
            status: "NEW".to_string(),
        }
    }
}

/// Notification service boundary
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send(&self, notification: Notification) -> ClientResult<()>;
}

/// HTTP implementation against the notification service's REST API
pub struct HttpNotification {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotification {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl NotificationClient for HttpNotification {
    async fn send(&self, notification: Notification) -> ClientResult<()> {
        debug!(category = %notification.category, "sending notification");
        let url = format!("{}/api/v2/notification", self.base_url);
        expect_success(self.client.post(&url).json(&notification).send().await?).await?;
        Ok(())
    }
}
