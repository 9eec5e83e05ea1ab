//! Command dispatch client
//!
//! Issues named set-commands with string parameters to devices when a rule
//! fires. Success or failure is all the core needs; delivery is
//! at-least-once best-effort.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ClientResult;
use crate::expect_success;

/// Command dispatch boundary
#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn issue_set_command(
        &self,
        device_name: &str,
        command_name: &str,
        params: HashMap<String, String>,
    ) -> ClientResult<()>;
}

/// HTTP implementation against the command service's REST API
pub struct HttpCommand {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCommand {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CommandClient for HttpCommand {
    async fn issue_set_command(
        &self,
        device_name: &str,
        command_name: &str,
        params: HashMap<String, String>,
    ) -> ClientResult<()> {
        debug!(device = %device_name, command = %command_name, "issuing set command");
        let url = format!(
            "{}/api/v2/device/name/{}/{}",
            self.base_url, device_name, command_name
        );
        expect_success(self.client.put(&url).json(&params).send().await?).await?;
        Ok(())
    }
}
