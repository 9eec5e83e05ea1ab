//! Configuration structures

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Bind address of this service
///
/// The host doubles as the callback host handed to the scheduler and the
/// stream engine, so it must be reachable from them; `localhost` only works
/// when everything runs on one machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Base URLs of the surrounding services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEndpoints {
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
    #[serde(default = "default_stream_engine")]
    pub stream_engine: String,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_notification")]
    pub notification: String,
}

impl Default for ClientEndpoints {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            scheduler: default_scheduler(),
            stream_engine: default_stream_engine(),
            command: default_command(),
            notification: default_notification(),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub clients: ClientEndpoints,

    /// Name of the shared device-reading stream on the stream engine
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            clients: ClientEndpoints::default(),
            stream_name: default_stream_name(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("loading configuration from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from a file when it exists, otherwise use the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("no configuration file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    59720
}

fn default_registry() -> String {
    "http://localhost:59881".to_string()
}

fn default_scheduler() -> String {
    "http://localhost:59861".to_string()
}

fn default_stream_engine() -> String {
    "http://localhost:9081".to_string()
}

fn default_command() -> String {
    "http://localhost:59882".to_string()
}

fn default_notification() -> String {
    "http://localhost:59860".to_string()
}

fn default_stream_name() -> String {
    "deviceStream".to_string()
}
