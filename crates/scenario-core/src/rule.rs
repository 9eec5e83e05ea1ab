//! Rule definition and validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;
use crate::condition::Condition;

/// Rule errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule name is required")]
    EmptyName,

    #[error("rule must have at least one condition")]
    EmptyConditions,

    #[error("rule has no actions and notifications are disabled")]
    NoEffect,

    #[error("condition at index {index} is invalid: {reason}")]
    InvalidCondition { index: usize, reason: String },
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

/// Administrative state of a rule
///
/// A locked rule keeps its external resources synchronized but does not
/// latch trigger edges or fire actions; its stream-engine rules are stopped
/// rather than deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    Locked,
    #[default]
    Unlocked,
}

/// A complete automation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// UUID identity, generated on add when absent
    #[serde(default)]
    pub id: String,

    /// Unique secondary key enforced by the store
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Must be Unlocked for actions and notifications to fire
    #[serde(default)]
    pub admin_state: AdminState,

    /// Emit a notification event when the rule fires
    #[serde(default)]
    pub notify_enable: bool,

    /// Ordered, non-empty; each maps 1:1 to an external resource
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Rule {
    /// Validate the rule before any external call is made
    pub fn validate(&self) -> RuleResult<()> {
        if self.name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if self.conditions.is_empty() {
            return Err(RuleError::EmptyConditions);
        }
        if self.actions.is_empty() && !self.notify_enable {
            return Err(RuleError::NoEffect);
        }
        for (index, condition) in self.conditions.iter().enumerate() {
            condition
                .validate()
                .map_err(|reason| RuleError::InvalidCondition { index, reason })?;
        }
        Ok(())
    }

    /// Build the updated rule from an existing one and a partial request
    ///
    /// Omitted fields inherit the existing value; the id always does.
    pub fn apply_patch(existing: &Rule, patch: RulePatch) -> Rule {
        Rule {
            id: existing.id.clone(),
            name: patch.name.unwrap_or_else(|| existing.name.clone()),
            description: patch
                .description
                .unwrap_or_else(|| existing.description.clone()),
            admin_state: patch.admin_state.unwrap_or(existing.admin_state),
            notify_enable: patch.notify_enable.unwrap_or(existing.notify_enable),
            conditions: patch
                .conditions
                .unwrap_or_else(|| existing.conditions.clone()),
            actions: patch.actions.unwrap_or_else(|| existing.actions.clone()),
        }
    }
}

/// Partial rule update; `None` fields inherit the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub admin_state: Option<AdminState>,
    #[serde(default)]
    pub notify_enable: Option<bool>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub actions: Option<Vec<Action>>,
}

/// Callback body posted by the scheduler and the stream engine when a
/// condition edge occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPayload {
    pub trigger_state: bool,
    pub trigger_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CombineLogic, ScheduleCondition};

    fn sample_rule() -> Rule {
        serde_json::from_str(
            r#"{
                "name": "night-fan",
                "conditions": [
                    {"type": "threshold", "logic": "and",
                     "deviceThreshold": "sensor-1", "resourceThreshold": "temperature",
                     "operatorThreshold": ">", "valueThreshold": "30"}
                ],
                "actions": [
                    {"deviceName": "fan-1", "commandName": "setSpeed", "body": "{\"speed\":\"high\"}"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_rule_deserialize_defaults() {
        let rule = sample_rule();
        assert!(rule.id.is_empty());
        assert_eq!(rule.admin_state, AdminState::Unlocked);
        assert!(!rule.notify_enable);
    }

    #[test]
    fn test_admin_state_wire_format() {
        assert_eq!(
            serde_json::to_string(&AdminState::Locked).unwrap(),
            r#""LOCKED""#
        );
        let state: AdminState = serde_json::from_str(r#""UNLOCKED""#).unwrap();
        assert_eq!(state, AdminState::Unlocked);
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_rule().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_name() {
        let mut rule = sample_rule();
        rule.name.clear();
        assert!(matches!(rule.validate(), Err(RuleError::EmptyName)));
    }

    #[test]
    fn test_validate_requires_conditions() {
        let mut rule = sample_rule();
        rule.conditions.clear();
        assert!(matches!(rule.validate(), Err(RuleError::EmptyConditions)));
    }

    #[test]
    fn test_validate_rejects_actionless_silent_rule() {
        let mut rule = sample_rule();
        rule.actions.clear();
        assert!(matches!(rule.validate(), Err(RuleError::NoEffect)));

        rule.notify_enable = true;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_apply_patch_inherits_omitted_fields() {
        let existing = sample_rule();
        let patch = RulePatch {
            description: Some("cools the rack at night".to_string()),
            ..RulePatch::default()
        };

        let updated = Rule::apply_patch(&existing, patch);
        assert_eq!(updated.name, existing.name);
        assert_eq!(updated.description, "cools the rack at night");
        assert_eq!(updated.conditions, existing.conditions);
        assert_eq!(updated.actions, existing.actions);
    }

    #[test]
    fn test_apply_patch_replaces_conditions() {
        let existing = sample_rule();
        let patch = RulePatch {
            conditions: Some(vec![Condition::Schedule(ScheduleCondition {
                logic: CombineLogic::And,
                start_time: String::new(),
                end_time: String::new(),
                interval_time: "1h".to_string(),
            })]),
            ..RulePatch::default()
        };

        let updated = Rule::apply_patch(&existing, patch);
        assert_eq!(updated.conditions.len(), 1);
        assert!(updated.conditions[0].is_schedule());
    }

    #[test]
    fn test_trigger_payload_wire_format() {
        let payload: TriggerPayload =
            serde_json::from_str(r#"{"triggerState":true,"triggerIndex":2}"#).unwrap();
        assert!(payload.trigger_state);
        assert_eq!(payload.trigger_index, 2);
    }
}
