//! Core data model for the automation rule service
//!
//! A rule fires actions (device commands, optionally a notification) when a
//! boolean combination of conditions becomes true. Conditions are either
//! schedule-based (an interval timer) or threshold-based (a comparison over a
//! streamed metric). Each condition is mirrored 1:1 by an external resource
//! (a scheduler interval or a stream-engine rule) named `<rule id>_<index>`.
//!
//! # Key Types
//!
//! - [`Rule`] - complete rule definition with conditions and actions
//! - [`Condition`] - schedule or threshold predicate
//! - [`Action`] - device command issued when the rule fires
//! - [`ConditionChange`] - structural diff descriptor used for reconciliation

pub mod action;
pub mod condition;
pub mod naming;
pub mod properties;
pub mod rule;

pub use action::Action;
pub use condition::{
    CombineLogic, Condition, ConditionChange, ScheduleCondition, ThresholdCondition,
    ThresholdOperator,
};
pub use naming::{parse_resource_name, resource_name};
pub use properties::PropertyMap;
pub use rule::{AdminState, Rule, RuleError, RulePatch, RuleResult, TriggerPayload};
