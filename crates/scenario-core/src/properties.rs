//! Property-map encoding for registry persistence
//!
//! Rules are persisted as device-like registry entries whose protocol
//! properties hold the rule content in three namespaces:
//!
//! - `conditions`: key = stringified condition index, value = JSON condition
//! - `actions`: key = `device/command`, value = JSON body
//! - `notify`: the notify flag and the encoding version
//!
//! The encoding is version 1. Decoding is strict: an entry whose conditions
//! are absent, sparse, or malformed is not a valid rule and yields `None`,
//! which the startup reconciliation treats as an orphan.

use std::collections::HashMap;

use crate::action::Action;
use crate::condition::Condition;
use crate::rule::{AdminState, Rule};

/// Two-level property map attached to a registry entry
pub type PropertyMap = HashMap<String, HashMap<String, String>>;

pub const CONDITIONS_NAMESPACE: &str = "conditions";
pub const ACTIONS_NAMESPACE: &str = "actions";
pub const NOTIFY_NAMESPACE: &str = "notify";

pub const NOTIFY_KEY: &str = "notify";
pub const VERSION_KEY: &str = "version";
pub const ENCODING_VERSION: &str = "1";

/// Encode conditions keyed by index
pub fn conditions_to_properties(conditions: &[Condition]) -> HashMap<String, String> {
    conditions
        .iter()
        .enumerate()
        .filter_map(|(index, condition)| {
            serde_json::to_string(condition)
                .ok()
                .map(|value| (index.to_string(), value))
        })
        .collect()
}

/// Decode conditions from an index-keyed property namespace
///
/// Every index from 0 to len-1 must be present and parse into a valid
/// condition, otherwise the whole namespace is rejected.
pub fn conditions_from_properties(properties: &HashMap<String, String>) -> Option<Vec<Condition>> {
    if properties.is_empty() {
        return None;
    }

    let mut conditions = Vec::with_capacity(properties.len());
    for index in 0..properties.len() {
        let value = properties.get(&index.to_string())?;
        let condition: Condition = serde_json::from_str(value).ok()?;
        condition.validate().ok()?;
        conditions.push(condition);
    }
    Some(conditions)
}

/// Encode actions keyed by `device/command`
///
/// The key is the action's identity: two actions against the same
/// device/command pair collapse into one, later entries winning. This
/// mirrors the stored format and is a documented limitation of the
/// encoding, not a bug to fix here.
pub fn actions_to_properties(actions: &[Action]) -> HashMap<String, String> {
    actions
        .iter()
        .map(|action| (action.key(), action.body.clone()))
        .collect()
}

/// Decode actions, skipping keys without a `device/command` shape
///
/// Map order is not meaningful; entries are sorted by key for a stable
/// result.
pub fn actions_from_properties(properties: &HashMap<String, String>) -> Vec<Action> {
    let mut entries: Vec<(&String, &String)> = properties.iter().collect();
    entries.sort_by_key(|(key, _)| key.as_str());

    entries
        .into_iter()
        .filter_map(|(key, body)| {
            let (device_name, command_name) = key.split_once('/')?;
            Some(Action {
                device_name: device_name.to_string(),
                command_name: command_name.to_string(),
                body: body.clone(),
            })
        })
        .collect()
}

/// Encode a rule's content into its registry property map
pub fn rule_to_properties(rule: &Rule) -> PropertyMap {
    let mut properties = PropertyMap::new();

    if !rule.actions.is_empty() {
        properties.insert(ACTIONS_NAMESPACE.to_string(), actions_to_properties(&rule.actions));
    }

    let mut notify = HashMap::new();
    notify.insert(NOTIFY_KEY.to_string(), rule.notify_enable.to_string());
    notify.insert(VERSION_KEY.to_string(), ENCODING_VERSION.to_string());
    properties.insert(NOTIFY_NAMESPACE.to_string(), notify);

    properties.insert(
        CONDITIONS_NAMESPACE.to_string(),
        conditions_to_properties(&rule.conditions),
    );

    properties
}

/// Decode a rule from registry entry metadata and its property map
///
/// Returns `None` when the properties do not describe a valid rule: missing
/// or malformed conditions, an unknown encoding version, or an action-less
/// rule with notifications disabled.
pub fn rule_from_properties(
    id: &str,
    name: &str,
    description: &str,
    admin_state: AdminState,
    properties: &PropertyMap,
) -> Option<Rule> {
    if let Some(notify) = properties.get(NOTIFY_NAMESPACE) {
        if let Some(version) = notify.get(VERSION_KEY) {
            if version != ENCODING_VERSION {
                return None;
            }
        }
    }

    let conditions = conditions_from_properties(properties.get(CONDITIONS_NAMESPACE)?)?;

    let notify_enable = properties
        .get(NOTIFY_NAMESPACE)
        .and_then(|ns| ns.get(NOTIFY_KEY))
        .and_then(|value| value.parse().ok())
        .unwrap_or(false);

    let actions = properties
        .get(ACTIONS_NAMESPACE)
        .map(actions_from_properties)
        .unwrap_or_default();

    let rule = Rule {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        admin_state,
        notify_enable,
        conditions,
        actions,
    };
    rule.validate().ok()?;
    Some(rule)
}
