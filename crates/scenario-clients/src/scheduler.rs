//! Scheduler client
//!
//! Schedule conditions are backed by two scheduler resources sharing the
//! condition's external name: an interval (start/end/period) and a companion
//! interval action whose REST callback posts the trigger payload back to
//! this service. The interval action's admin state mirrors the rule's, which
//! is how a locked rule's schedule conditions are silenced without deleting
//! them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scenario_core::AdminState;

use crate::error::ClientResult;
use crate::expect_success;

/// Interval timer entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub name: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    pub interval: String,
}

/// REST callback address of an interval action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    #[serde(rename = "httpMethod")]
    pub http_method: String,
}

impl RestAddress {
    pub fn post(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            address_type: "REST".to_string(),
            host: host.into(),
            port,
            path: path.into(),
            http_method: "POST".to_string(),
        }
    }
}

/// Callback fired every interval tick
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalAction {
    pub name: String,
    pub interval_name: String,
    pub admin_state: AdminState,
    pub address: RestAddress,
    pub content_type: String,
    pub content: String,
}

/// Scheduler service boundary
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn add_interval(&self, interval: Interval) -> ClientResult<()>;
    async fn update_interval(&self, interval: Interval) -> ClientResult<()>;
    async fn delete_interval(&self, name: &str) -> ClientResult<()>;
    async fn all_intervals(&self) -> ClientResult<Vec<Interval>>;

    async fn add_interval_action(&self, action: IntervalAction) -> ClientResult<()>;
    async fn update_interval_action(&self, action: IntervalAction) -> ClientResult<()>;
    async fn delete_interval_action(&self, name: &str) -> ClientResult<()>;
    async fn all_interval_actions(&self) -> ClientResult<Vec<IntervalAction>>;
}

/// HTTP implementation against the scheduler's REST API
pub struct HttpScheduler {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScheduler {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }
}

#[async_trait]
impl SchedulerClient for HttpScheduler {
    async fn add_interval(&self, interval: Interval) -> ClientResult<()> {
        debug!(interval = %interval.name, "adding interval");
        let url = self.url("interval");
        expect_success(self.client.post(&url).json(&interval).send().await?).await?;
        Ok(())
    }

    async fn update_interval(&self, interval: Interval) -> ClientResult<()> {
        debug!(interval = %interval.name, "updating interval");
        let url = self.url("interval");
        expect_success(self.client.put(&url).json(&interval).send().await?).await?;
        Ok(())
    }

    async fn delete_interval(&self, name: &str) -> ClientResult<()> {
        debug!(interval = %name, "deleting interval");
        let url = self.url(&format!("interval/name/{}", name));
        expect_success(self.client.delete(&url).send().await?).await?;
        Ok(())
    }

    async fn all_intervals(&self) -> ClientResult<Vec<Interval>> {
        let url = self.url("interval/all");
        let response = expect_success(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn add_interval_action(&self, action: IntervalAction) -> ClientResult<()> {
        debug!(action = %action.name, "adding interval action");
        let url = self.url("intervalaction");
        expect_success(self.client.post(&url).json(&action).send().await?).await?;
        Ok(())
    }

    async fn update_interval_action(&self, action: IntervalAction) -> ClientResult<()> {
        debug!(action = %action.name, "updating interval action");
        let url = self.url("intervalaction");
        expect_success(self.client.put(&url).json(&action).send().await?).await?;
        Ok(())
    }

    async fn delete_interval_action(&self, name: &str) -> ClientResult<()> {
        debug!(action = %name, "deleting interval action");
        let url = self.url(&format!("intervalaction/name/{}", name));
        expect_success(self.client.delete(&url).send().await?).await?;
        Ok(())
    }

    async fn all_interval_actions(&self) -> ClientResult<Vec<IntervalAction>> {
        let url = self.url("intervalaction/all");
        let response = expect_success(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }
}
