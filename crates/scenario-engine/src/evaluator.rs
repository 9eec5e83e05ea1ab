//! Trigger evaluation
//!
//! External systems report condition edges by POSTing a trigger payload to
//! this service. The HTTP boundary enqueues the event onto a channel and
//! answers immediately; the evaluator consumes events one at a time,
//! latches the reported state, folds the rule's latch vector through its
//! combining logic, and fires the rule's actions when the fold comes out
//! true. Firing has no cooldown: an always-true combination fires on every
//! qualifying edge.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scenario_clients::{CommandClient, Notification, NotificationClient};
use scenario_core::{AdminState, CombineLogic, Condition, Rule, TriggerPayload};
use scenario_store::RuleStore;

/// One condition edge reported by the scheduler or the stream engine
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub rule_id: String,
    pub payload: TriggerPayload,
}

/// Producer half of the trigger hand-off; cheap to clone into handlers
#[derive(Clone)]
pub struct TriggerQueue {
    tx: mpsc::UnboundedSender<TriggerEvent>,
}

impl TriggerQueue {
    /// Enqueue a trigger event for asynchronous evaluation
    ///
    /// Dropped silently if the evaluator has shut down; a late callback
    /// during teardown is not an error.
    pub fn push(&self, rule_id: impl Into<String>, payload: TriggerPayload) {
        let event = TriggerEvent {
            rule_id: rule_id.into(),
            payload,
        };
        if self.tx.send(event).is_err() {
            warn!("trigger evaluator is not running, dropping event");
        }
    }
}

/// Fold a rule's latch vector through its combining logic
///
/// The latch at index 0 seeds the fold (its own logic is ignored); each
/// subsequent index combines left to right with AND or OR per its
/// condition's logic.
pub fn combined_state(conditions: &[Condition], latches: &[bool]) -> bool {
    let mut result = latches.first().copied().unwrap_or(false);
    for (index, condition) in conditions.iter().enumerate().skip(1) {
        let state = latches.get(index).copied().unwrap_or(false);
        result = match condition.logic() {
            CombineLogic::And => result && state,
            CombineLogic::Or => result || state,
        };
    }
    result
}

/// Consumes trigger events, updates latched state, and fires rules
pub struct TriggerEvaluator {
    store: Arc<RuleStore>,
    commands: Arc<dyn CommandClient>,
    notifications: Arc<dyn NotificationClient>,
    sender: String,
}

impl TriggerEvaluator {
    pub fn new(
        store: Arc<RuleStore>,
        commands: Arc<dyn CommandClient>,
        notifications: Arc<dyn NotificationClient>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            store,
            commands,
            notifications,
            sender: sender.into(),
        }
    }

    /// Spawn the consumer task and hand back the producer queue
    ///
    /// The task ends when every queue clone is dropped.
    pub fn start(self: Arc<Self>) -> (TriggerQueue, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(event).await;
            }
            debug!("trigger evaluator stopped");
        });
        (TriggerQueue { tx }, handle)
    }

    /// Process one trigger event
    pub async fn handle(&self, event: TriggerEvent) {
        let Some(rule) = self.store.for_id(&event.rule_id) else {
            warn!(rule_id = %event.rule_id, "trigger for unknown rule, dropping");
            return;
        };

        // A locked rule must not latch stale edges.
        if rule.admin_state != AdminState::Unlocked {
            debug!(rule = %rule.name, "rule locked, dropping trigger");
            return;
        }

        let index = event.payload.trigger_index;
        if index >= rule.conditions.len() {
            error!(
                rule = %rule.name,
                index,
                "trigger index out of range, dropping"
            );
            return;
        }

        self.store
            .set_condition_state(&rule.id, index, event.payload.trigger_state);

        let latches = self.store.condition_states(&rule.id);
        let satisfied = combined_state(&rule.conditions, &latches);

        // Schedule ticks are momentary pulses, not level signals: the latch
        // contributes true only for this evaluation.
        if rule.conditions[index].is_schedule() {
            self.store.set_condition_state(&rule.id, index, false);
        }

        if satisfied {
            info!(rule = %rule.name, "rule triggered");
            self.fire(&rule).await;
        }
    }

    /// Dispatch every action in declaration order, then notify
    ///
    /// Individual failures are collected and reported together; they never
    /// abort sibling actions.
    async fn fire(&self, rule: &Rule) {
        let mut failures = Vec::new();

        for (index, action) in rule.actions.iter().enumerate() {
            let params = match action.params() {
                Ok(params) => params,
                Err(reason) => {
                    failures.push(format!("action[{}]: {}", index, reason));
                    continue;
                }
            };

            match self
                .commands
                .issue_set_command(&action.device_name, &action.command_name, params)
                .await
            {
                Ok(()) => {
                    debug!(rule = %rule.name, index, device = %action.device_name, "action dispatched")
                }
                Err(err) => failures.push(format!("action[{}]: {}", index, err)),
            }
        }

        if !failures.is_empty() {
            error!(
                rule = %rule.name,
                "action dispatch failures: {}",
                failures.join("; ")
            );
        }

        if rule.notify_enable {
            let notification = Notification::rule_triggered(&rule.name, &self.sender);
            if let Err(err) = self.notifications.send(notification).await {
                error!(rule = %rule.name, %err, "failed to send notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_core::{ScheduleCondition, ThresholdCondition, ThresholdOperator};

    fn condition(logic: CombineLogic) -> Condition {
        Condition::Threshold(ThresholdCondition {
            logic,
            device_threshold: "sensor-1".to_string(),
            resource_threshold: "temperature".to_string(),
            operator_threshold: ThresholdOperator::Greater,
            value_threshold: "30".to_string(),
        })
    }

    fn schedule(logic: CombineLogic) -> Condition {
        Condition::Schedule(ScheduleCondition {
            logic,
            start_time: String::new(),
            end_time: String::new(),
            interval_time: "20s".to_string(),
        })
    }

    #[test]
    fn test_fold_left_to_right() {
        // (T or F) and T = T
        let conditions = vec![
            condition(CombineLogic::And),
            condition(CombineLogic::Or),
            condition(CombineLogic::And),
        ];
        assert!(combined_state(&conditions, &[true, false, true]));

        // (F or F) and T = F
        assert!(!combined_state(&conditions, &[false, false, true]));
    }

    #[test]
    fn test_fold_seed_logic_ignored() {
        // Index 0's own logic never participates.
        let conditions = vec![condition(CombineLogic::Or)];
        assert!(combined_state(&conditions, &[true]));
        assert!(!combined_state(&conditions, &[false]));
    }

    #[test]
    fn test_fold_mixed_types() {
        let conditions = vec![schedule(CombineLogic::And), condition(CombineLogic::And)];
        assert!(combined_state(&conditions, &[true, true]));
        assert!(!combined_state(&conditions, &[true, false]));
    }

    #[test]
    fn test_fold_empty_is_false() {
        assert!(!combined_state(&[], &[]));
    }

    #[test]
    fn test_fold_missing_latch_reads_false() {
        let conditions = vec![condition(CombineLogic::And), condition(CombineLogic::And)];
        assert!(!combined_state(&conditions, &[true]));
    }
}
