//! Boundary clients for the external systems this service drives
//!
//! The core talks to four external collaborators over HTTP: the device
//! registry (durable rule storage), the scheduler (intervals and their
//! callback actions), the stream-processing engine (continuous threshold
//! queries), and command dispatch. Each collaborator is a trait here so the
//! engine can be exercised against in-memory fakes; the `Http*` types are
//! the production implementations over a shared [`reqwest::Client`].
//!
//! Calls are synchronous network requests with no built-in retry; any retry
//! policy belongs to the caller or the transport.

pub mod command;
pub mod error;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod stream;

pub use command::{CommandClient, HttpCommand};
pub use error::{ClientError, ClientResult};
pub use notify::{HttpNotification, Notification, NotificationClient};
pub use registry::{HttpRegistry, RegistryClient, RegistryEntry};
pub use scheduler::{HttpScheduler, Interval, IntervalAction, RestAddress, SchedulerClient};
pub use stream::{HttpStreamEngine, StreamEngineClient, StreamRule};

/// Where external systems reach back into this service
///
/// Both scheduler interval actions and stream-engine rule actions POST their
/// trigger payloads to `http://{host}:{port}/api/v2/rule/id/{rule_id}`.
#[derive(Debug, Clone)]
pub struct CallbackTarget {
    pub host: String,
    pub port: u16,
}

impl CallbackTarget {
    /// Callback URL for one rule's trigger endpoint
    pub fn rule_url(&self, rule_id: &str) -> String {
        format!("http://{}:{}/api/v2/rule/id/{}", self.host, self.port, rule_id)
    }

    /// Callback path for one rule, for address-style bodies
    pub fn rule_path(rule_id: &str) -> String {
        format!("/api/v2/rule/id/{}", rule_id)
    }
}

pub(crate) async fn expect_success(
    response: reqwest::Response,
) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { status, body })
    }
}
