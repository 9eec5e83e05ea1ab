//! Stream-processing engine client
//!
//! Threshold conditions compile into continuous queries over a shared input
//! stream. Each query windows the last two samples of the condition's
//! resource for the condition's device and raises its REST action when the
//! first or the current sample crosses the threshold - the asymmetric
//! windowing that turns a level comparison into an edge-triggered callback:
//! the selected value reports whether the condition holds *now*, while the
//! HAVING clause fires on a crossing in either direction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use scenario_core::ThresholdCondition;

use crate::error::ClientResult;
use crate::{expect_success, CallbackTarget};

/// A continuous-query rule as the stream engine's REST API accepts it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRule {
    pub id: String,
    pub sql: String,
    pub actions: Vec<serde_json::Value>,
}

/// Build the continuous query backing one threshold condition
///
/// `name` is the condition's external resource name (`<rule id>_<index>`),
/// which doubles as the stream-engine rule id.
pub fn threshold_rule(
    name: &str,
    rule_id: &str,
    index: usize,
    condition: &ThresholdCondition,
    stream_name: &str,
    callback: &CallbackTarget,
) -> StreamRule {
    let res = &condition.resource_threshold;
    let op = condition.operator_threshold.as_str();
    let val = &condition.value_threshold;

    let sql = format!(
        "SELECT (collect({res})[1] {op} {val}) AS v FROM {stream} \
         GROUP BY PADCOUNTWINDOW(2,1) \
         FILTER(WHERE meta(deviceName) = \"{dev}\") \
         HAVING collect({res})[0] {op} {val} OR collect({res})[1] {op} {val}",
        res = res,
        op = op,
        val = val,
        stream = stream_name,
        dev = condition.device_threshold,
    );

    let action = json!({
        "rest": {
            "url": callback.rule_url(rule_id),
            "method": "post",
            "dataTemplate": format!(
                "{{\"triggerState\":{{{{.v}}}},\"triggerIndex\":{}}}",
                index
            ),
            "sendSingle": true,
        }
    });

    StreamRule {
        id: name.to_string(),
        sql,
        actions: vec![action],
    }
}

/// Stream-processing engine boundary
#[async_trait]
pub trait StreamEngineClient: Send + Sync {
    /// Whether the named input stream exists
    async fn stream_exists(&self, name: &str) -> ClientResult<bool>;

    /// Create the shared input stream
    async fn create_stream(&self, name: &str) -> ClientResult<()>;

    async fn create_rule(&self, rule: &StreamRule) -> ClientResult<()>;
    async fn update_rule(&self, rule: &StreamRule) -> ClientResult<()>;
    async fn drop_rule(&self, name: &str) -> ClientResult<()>;

    async fn start_rule(&self, name: &str) -> ClientResult<()>;
    async fn stop_rule(&self, name: &str) -> ClientResult<()>;
    async fn restart_rule(&self, name: &str) -> ClientResult<()>;

    /// Ids of every rule the engine currently knows
    async fn rule_names(&self) -> ClientResult<Vec<String>>;
}

/// HTTP implementation against the stream engine's REST API
pub struct HttpStreamEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStreamEngine {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StreamEngineClient for HttpStreamEngine {
    async fn stream_exists(&self, name: &str) -> ClientResult<bool> {
        let url = format!("{}/streams/{}", self.base_url, name);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    async fn create_stream(&self, name: &str) -> ClientResult<()> {
        debug!(stream = %name, "creating input stream");
        let url = format!("{}/streams", self.base_url);
        let body = json!({
            "sql": format!(
                "create stream {} () WITH (FORMAT=\"JSON\", TYPE=\"edgex\")",
                name
            )
        });
        expect_success(self.client.post(&url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn create_rule(&self, rule: &StreamRule) -> ClientResult<()> {
        debug!(rule = %rule.id, "creating stream rule");
        let url = format!("{}/rules", self.base_url);
        expect_success(self.client.post(&url).json(rule).send().await?).await?;
        Ok(())
    }

    async fn update_rule(&self, rule: &StreamRule) -> ClientResult<()> {
        debug!(rule = %rule.id, "updating stream rule");
        let url = format!("{}/rules/{}", self.base_url, rule.id);
        expect_success(self.client.put(&url).json(rule).send().await?).await?;
        Ok(())
    }

    async fn drop_rule(&self, name: &str) -> ClientResult<()> {
        debug!(rule = %name, "dropping stream rule");
        let url = format!("{}/rules/{}", self.base_url, name);
        expect_success(self.client.delete(&url).send().await?).await?;
        Ok(())
    }

    async fn start_rule(&self, name: &str) -> ClientResult<()> {
        let url = format!("{}/rules/{}/start", self.base_url, name);
        expect_success(self.client.post(&url).send().await?).await?;
        Ok(())
    }

    async fn stop_rule(&self, name: &str) -> ClientResult<()> {
        let url = format!("{}/rules/{}/stop", self.base_url, name);
        expect_success(self.client.post(&url).send().await?).await?;
        Ok(())
    }

    async fn restart_rule(&self, name: &str) -> ClientResult<()> {
        let url = format!("{}/rules/{}/restart", self.base_url, name);
        expect_success(self.client.post(&url).send().await?).await?;
        Ok(())
    }

    async fn rule_names(&self) -> ClientResult<Vec<String>> {
        let url = format!("{}/rules", self.base_url);
        let response = expect_success(self.client.get(&url).send().await?).await?;
        let rules: Vec<serde_json::Value> = response.json().await?;
        Ok(rules
            .into_iter()
            .filter_map(|rule| rule.get("id").and_then(|id| id.as_str()).map(String::from))
            .collect())
    }
}
