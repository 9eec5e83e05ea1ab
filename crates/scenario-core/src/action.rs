//! Action types
//!
//! An action is a device command issued when a rule fires. The body is a
//! JSON object of string parameters, kept as a string so it round-trips
//! through the registry property encoding untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Device command issued when a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Target device name
    pub device_name: String,

    /// Command name on the device
    pub command_name: String,

    /// JSON object of string parameters, serialized
    pub body: String,
}

impl Action {
    /// Identity used by the registry property encoding
    ///
    /// Two actions with the same device/command pair collapse into one when
    /// round-tripped through properties.
    pub fn key(&self) -> String {
        format!("{}/{}", self.device_name, self.command_name)
    }

    /// Parse the body into command parameters
    ///
    /// Fails on malformed JSON or an empty parameter set.
    pub fn params(&self) -> Result<HashMap<String, String>, String> {
        let params: HashMap<String, String> =
            serde_json::from_str(&self.body).map_err(|e| e.to_string())?;
        if params.is_empty() {
            return Err("no parameters specified".to_string());
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_key() {
        let action = Action {
            device_name: "fan-1".to_string(),
            command_name: "setSpeed".to_string(),
            body: r#"{"speed":"high"}"#.to_string(),
        };
        assert_eq!(action.key(), "fan-1/setSpeed");
    }

    #[test]
    fn test_params_parse() {
        let action = Action {
            device_name: "fan-1".to_string(),
            command_name: "setSpeed".to_string(),
            body: r#"{"speed":"high"}"#.to_string(),
        };
        let params = action.params().unwrap();
        assert_eq!(params.get("speed").map(String::as_str), Some("high"));
    }

    #[test]
    fn test_params_rejects_empty_object() {
        let action = Action {
            device_name: "fan-1".to_string(),
            command_name: "setSpeed".to_string(),
            body: "{}".to_string(),
        };
        assert!(action.params().is_err());
    }

    #[test]
    fn test_params_rejects_malformed_body() {
        let action = Action {
            device_name: "fan-1".to_string(),
            command_name: "setSpeed".to_string(),
            body: "not json".to_string(),
        };
        assert!(action.params().is_err());
    }
}
