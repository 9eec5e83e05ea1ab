//! Service configuration
//!
//! Loads the service's YAML configuration file, falling back to built-in
//! defaults for anything the file omits. The defaults match a local
//! single-host deployment of the surrounding services.

mod error;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ClientEndpoints, ServiceConfig, ServiceSettings};
