//! Device registry client
//!
//! The registry is the durable backing store for rule metadata. Rules are
//! persisted as device-like entries tagged with the automation profile,
//! carrying the rule content in their property map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scenario_core::{AdminState, PropertyMap};

use crate::error::ClientResult;
use crate::expect_success;

/// A device-like registry record holding one persisted rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub admin_state: AdminState,
    #[serde(default = "default_operating_state")]
    pub operating_state: String,
    pub profile_name: String,
    pub service_name: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

fn default_operating_state() -> String {
    "UP".to_string()
}

/// Durable rule storage boundary
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// All entries tagged with a profile
    async fn entries_for_profile(&self, profile: &str) -> ClientResult<Vec<RegistryEntry>>;

    async fn add_entry(&self, entry: RegistryEntry) -> ClientResult<()>;

    async fn update_entry(&self, entry: RegistryEntry) -> ClientResult<()>;

    async fn delete_by_name(&self, name: &str) -> ClientResult<()>;
}

/// HTTP implementation against the device registry's REST API
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn entries_for_profile(&self, profile: &str) -> ClientResult<Vec<RegistryEntry>> {
        let url = format!("{}/api/v2/device/profile/{}", self.base_url, profile);
        let response = expect_success(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn add_entry(&self, entry: RegistryEntry) -> ClientResult<()> {
        debug!(entry = %entry.name, "adding registry entry");
        let url = format!("{}/api/v2/device", self.base_url);
        expect_success(self.client.post(&url).json(&entry).send().await?).await?;
        Ok(())
    }

    async fn update_entry(&self, entry: RegistryEntry) -> ClientResult<()> {
        debug!(entry = %entry.name, "updating registry entry");
        let url = format!("{}/api/v2/device", self.base_url);
        expect_success(self.client.put(&url).json(&entry).send().await?).await?;
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> ClientResult<()> {
        debug!(entry = %name, "deleting registry entry");
        let url = format!("{}/api/v2/device/name/{}", self.base_url, name);
        expect_success(self.client.delete(&url).send().await?).await?;
        Ok(())
    }
}
