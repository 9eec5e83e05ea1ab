//! Rule engine core
//!
//! This crate keeps three things consistent under concurrent mutation: the
//! in-memory rule catalog (scenario-store), the per-condition latched
//! trigger state used to evaluate and/or combinations, and the external
//! resources (scheduler intervals, stream-engine continuous queries) that
//! must mirror each rule's conditions exactly.
//!
//! # Key Types
//!
//! - [`RuleService`] - Add/Update/Delete orchestration and startup reconciliation
//! - [`ConditionSynchronizer`] - compiles conditions to external resources and
//!   diffs condition lists into minimal add/update/delete sets
//! - [`TriggerEvaluator`] - consumes trigger callbacks, folds latches, fires actions

pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod sync;

pub use error::{EngineError, EngineResult};
pub use evaluator::{combined_state, TriggerEvaluator, TriggerEvent, TriggerQueue};
pub use lifecycle::{RuleService, RULE_PROFILE, SERVICE_NAME};
pub use sync::ConditionSynchronizer;
