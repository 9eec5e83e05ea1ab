//! Condition types
//!
//! A condition is a single boolean-producing predicate contributing to a
//! rule's trigger logic. The `logic` field says how the condition combines
//! with the running result when latches are folded left to right; the logic
//! of the condition at index 0 is the seed and is ignored by evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a condition combines with the running evaluation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineLogic {
    And,
    Or,
}

/// Comparison operator for threshold conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOperator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl ThresholdOperator {
    /// The operator as it appears in generated stream-engine SQL
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdOperator::Greater => ">",
            ThresholdOperator::Less => "<",
            ThresholdOperator::Equal => "=",
            ThresholdOperator::GreaterOrEqual => ">=",
            ThresholdOperator::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition definition
///
/// Tagged by `type` on the wire, matching the stored property encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// Periodic timer backed by a scheduler interval
    Schedule(ScheduleCondition),

    /// Metric comparison backed by a stream-engine continuous query
    Threshold(ThresholdCondition),
}

/// Schedule condition - fires on a timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCondition {
    /// Combining logic with the previous conditions
    pub logic: CombineLogic,

    /// Start of the active window, scheduler timestamp format
    #[serde(default)]
    pub start_time: String,

    /// End of the active window, scheduler timestamp format
    #[serde(default)]
    pub end_time: String,

    /// Tick period, e.g. "20s"
    pub interval_time: String,
}

/// Threshold condition - compares streamed samples of a device resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdCondition {
    /// Combining logic with the previous conditions
    pub logic: CombineLogic,

    /// Device whose readings are observed
    pub device_threshold: String,

    /// Resource (metric) name within the device
    pub resource_threshold: String,

    /// Comparison operator
    pub operator_threshold: ThresholdOperator,

    /// Value compared against, formatted into the continuous query verbatim
    pub value_threshold: String,
}

/// Structural change between an old and a new condition at the same index
///
/// Drives the minimal reconcile operation: `Unchanged` issues nothing,
/// `ContentChanged` updates the existing external resource in place, and
/// `TypeChanged` deletes and re-provisions because the resource kind differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionChange {
    Unchanged,
    ContentChanged,
    TypeChanged,
}

impl Condition {
    /// Combining logic of this condition
    pub fn logic(&self) -> CombineLogic {
        match self {
            Condition::Schedule(c) => c.logic,
            Condition::Threshold(c) => c.logic,
        }
    }

    /// Whether this condition contributes a momentary pulse rather than a
    /// level signal
    pub fn is_schedule(&self) -> bool {
        matches!(self, Condition::Schedule(_))
    }

    /// Compare against the condition previously provisioned at the same index
    pub fn compare(&self, old: &Condition) -> ConditionChange {
        match (self, old) {
            (Condition::Schedule(a), Condition::Schedule(b)) => {
                if a == b {
                    ConditionChange::Unchanged
                } else {
                    ConditionChange::ContentChanged
                }
            }
            (Condition::Threshold(a), Condition::Threshold(b)) => {
                if a == b {
                    ConditionChange::Unchanged
                } else {
                    ConditionChange::ContentChanged
                }
            }
            _ => ConditionChange::TypeChanged,
        }
    }

    /// Check the condition's own fields are usable
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Condition::Schedule(c) => {
                if c.interval_time.is_empty() {
                    return Err("schedule condition requires intervalTime".to_string());
                }
            }
            Condition::Threshold(c) => {
                if c.device_threshold.is_empty() {
                    return Err("threshold condition requires deviceThreshold".to_string());
                }
                if c.resource_threshold.is_empty() {
                    return Err("threshold condition requires resourceThreshold".to_string());
                }
                if c.value_threshold.is_empty() {
                    return Err("threshold condition requires valueThreshold".to_string());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(value: &str) -> Condition {
        Condition::Threshold(ThresholdCondition {
            logic: CombineLogic::And,
            device_threshold: "sensor-1".to_string(),
            resource_threshold: "temperature".to_string(),
            operator_threshold: ThresholdOperator::Greater,
            value_threshold: value.to_string(),
        })
    }

    fn schedule(interval: &str) -> Condition {
        Condition::Schedule(ScheduleCondition {
            logic: CombineLogic::Or,
            start_time: String::new(),
            end_time: String::new(),
            interval_time: interval.to_string(),
        })
    }

    #[test]
    fn test_threshold_condition_deserialize() {
        let json = r#"{
            "type": "threshold",
            "logic": "and",
            "deviceThreshold": "sensor-1",
            "resourceThreshold": "temperature",
            "operatorThreshold": ">=",
            "valueThreshold": "30"
        }"#;

        let condition: Condition = serde_json::from_str(json).unwrap();
        if let Condition::Threshold(c) = condition {
            assert_eq!(c.operator_threshold, ThresholdOperator::GreaterOrEqual);
            assert_eq!(c.value_threshold, "30");
        } else {
            panic!("Expected Threshold condition");
        }
    }

    #[test]
    fn test_schedule_condition_deserialize() {
        let json = r#"{
            "type": "schedule",
            "logic": "or",
            "intervalTime": "20s"
        }"#;

        let condition: Condition = serde_json::from_str(json).unwrap();
        if let Condition::Schedule(c) = condition {
            assert_eq!(c.logic, CombineLogic::Or);
            assert_eq!(c.interval_time, "20s");
            assert!(c.start_time.is_empty());
        } else {
            panic!("Expected Schedule condition");
        }
    }

    #[test]
    fn test_operator_wire_format() {
        let op: ThresholdOperator = serde_json::from_str(r#""<=""#).unwrap();
        assert_eq!(op, ThresholdOperator::LessOrEqual);
        assert_eq!(serde_json::to_string(&op).unwrap(), r#""<=""#);
    }

    #[test]
    fn test_compare_unchanged() {
        assert_eq!(
            threshold("30").compare(&threshold("30")),
            ConditionChange::Unchanged
        );
    }

    #[test]
    fn test_compare_content_changed() {
        assert_eq!(
            threshold("35").compare(&threshold("30")),
            ConditionChange::ContentChanged
        );
        assert_eq!(
            schedule("10s").compare(&schedule("20s")),
            ConditionChange::ContentChanged
        );
    }

    #[test]
    fn test_compare_type_changed() {
        assert_eq!(
            schedule("10s").compare(&threshold("30")),
            ConditionChange::TypeChanged
        );
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(threshold("").validate().is_err());
        assert!(schedule("").validate().is_err());
        assert!(threshold("30").validate().is_ok());
        assert!(schedule("20s").validate().is_ok());
    }
}
