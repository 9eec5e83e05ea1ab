//! Condition-to-external-resource synchronization
//!
//! Keeps exactly one external resource per condition index, of the kind
//! implied by the condition's type, in sync with the rule's desired state:
//! threshold conditions become stream-engine continuous queries, schedule
//! conditions become a scheduler interval plus its callback action. On
//! update, an old/new condition list is diffed index by index and only the
//! minimal operations are issued.
//!
//! Nothing here is transactional: a failure mid-sequence aborts with the
//! error and leaves earlier steps applied. The lifecycle decides what that
//! means for the cache.

use std::sync::Arc;

use tracing::{debug, info, warn};

use scenario_clients::{
    stream::threshold_rule, CallbackTarget, Interval, IntervalAction, RestAddress,
    SchedulerClient, StreamEngineClient,
};
use scenario_core::{
    parse_resource_name, resource_name, AdminState, Condition, ConditionChange, Rule,
    ScheduleCondition,
};
use scenario_store::RuleStore;

use crate::error::EngineResult;

/// Translates rule conditions into scheduler and stream-engine resources
pub struct ConditionSynchronizer {
    scheduler: Arc<dyn SchedulerClient>,
    stream: Arc<dyn StreamEngineClient>,
    callback: CallbackTarget,
    stream_name: String,
}

impl ConditionSynchronizer {
    pub fn new(
        scheduler: Arc<dyn SchedulerClient>,
        stream: Arc<dyn StreamEngineClient>,
        callback: CallbackTarget,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            scheduler,
            stream,
            callback,
            stream_name: stream_name.into(),
        }
    }

    /// Make sure the shared input stream exists on the stream engine
    pub async fn ensure_stream(&self) -> EngineResult<()> {
        match self.stream.stream_exists(&self.stream_name).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => {
                warn!(stream = %self.stream_name, %err, "describe stream failed, attempting create");
            }
        }
        self.stream.create_stream(&self.stream_name).await?;
        info!(stream = %self.stream_name, "created input stream");
        Ok(())
    }

    /// Create the external resource for every condition of a new rule
    pub async fn provision(&self, rule: &Rule) -> EngineResult<()> {
        for index in 0..rule.conditions.len() {
            self.provision_condition(rule, index).await?;
        }
        Ok(())
    }

    /// Diff old and new condition lists and apply the minimal operation set
    pub async fn reconcile(&self, new_rule: &Rule, old_rule: &Rule) -> EngineResult<()> {
        // Trailing old indices with no new counterpart are removed.
        for index in new_rule.conditions.len()..old_rule.conditions.len() {
            self.remove_condition(old_rule, index).await?;
        }

        for index in 0..new_rule.conditions.len() {
            if index >= old_rule.conditions.len() {
                self.provision_condition(new_rule, index).await?;
                continue;
            }

            let change = new_rule.conditions[index].compare(&old_rule.conditions[index]);
            if change == ConditionChange::TypeChanged {
                // The external resource kind differs; replace wholesale.
                self.remove_condition(old_rule, index).await?;
                self.provision_condition(new_rule, index).await?;
            } else {
                self.update_condition(new_rule, old_rule, index, change)
                    .await?;
            }
        }

        Ok(())
    }

    /// Delete the external resource for every condition of a rule
    pub async fn deprovision(&self, rule: &Rule) -> EngineResult<()> {
        for index in 0..rule.conditions.len() {
            self.remove_condition(rule, index).await?;
        }
        Ok(())
    }

    /// Delete external resources that no longer belong to any cached rule
    ///
    /// Run after startup reconciliation: any interval, interval action, or
    /// stream-engine rule whose name parses as `<uuid>_<index>` but whose
    /// rule id is absent from the cache is leftover garbage from an earlier
    /// incarnation. Failures are logged and skipped; garbage accumulating
    /// externally beats an inconsistent local cache.
    pub async fn sweep_orphans(&self, store: &RuleStore) {
        match self.scheduler.all_interval_actions().await {
            Ok(actions) => {
                for action in actions {
                    if self.is_orphan(&action.name, store) {
                        info!(resource = %action.name, "removing orphaned interval action");
                        if let Err(err) = self.scheduler.delete_interval_action(&action.name).await
                        {
                            warn!(resource = %action.name, %err, "failed to delete interval action");
                        }
                    }
                }
            }
            Err(err) => warn!(%err, "failed to list interval actions"),
        }

        match self.scheduler.all_intervals().await {
            Ok(intervals) => {
                for interval in intervals {
                    if self.is_orphan(&interval.name, store) {
                        info!(resource = %interval.name, "removing orphaned interval");
                        if let Err(err) = self.scheduler.delete_interval(&interval.name).await {
                            warn!(resource = %interval.name, %err, "failed to delete interval");
                        }
                    }
                }
            }
            Err(err) => warn!(%err, "failed to list intervals"),
        }

        match self.stream.rule_names().await {
            Ok(names) => {
                for name in names {
                    if self.is_orphan(&name, store) {
                        info!(resource = %name, "removing orphaned stream rule");
                        if let Err(err) = self.stream.drop_rule(&name).await {
                            warn!(resource = %name, %err, "failed to drop stream rule");
                        }
                    }
                }
            }
            Err(err) => warn!(%err, "failed to list stream rules"),
        }
    }

    fn is_orphan(&self, name: &str, store: &RuleStore) -> bool {
        matches!(parse_resource_name(name), Some((id, _)) if !store.exists(id))
    }

    async fn provision_condition(&self, rule: &Rule, index: usize) -> EngineResult<()> {
        let name = resource_name(&rule.id, index);
        debug!(resource = %name, "provisioning condition");

        match &rule.conditions[index] {
            Condition::Threshold(condition) => {
                let def = threshold_rule(
                    &name,
                    &rule.id,
                    index,
                    condition,
                    &self.stream_name,
                    &self.callback,
                );
                self.stream.create_rule(&def).await?;
                // The engine starts rules on create; a locked rule's query
                // must exist but stay quiet.
                if rule.admin_state == AdminState::Locked {
                    self.stream.stop_rule(&name).await?;
                }
            }
            Condition::Schedule(condition) => {
                self.scheduler
                    .add_interval(self.interval_for(&name, condition))
                    .await?;
                self.scheduler
                    .add_interval_action(self.interval_action_for(rule, &name, index))
                    .await?;
            }
        }
        Ok(())
    }

    async fn update_condition(
        &self,
        new_rule: &Rule,
        old_rule: &Rule,
        index: usize,
        change: ConditionChange,
    ) -> EngineResult<()> {
        let name = resource_name(&new_rule.id, index);
        let update_content = change == ConditionChange::ContentChanged;
        let mut update_state = new_rule.admin_state != old_rule.admin_state;

        match &new_rule.conditions[index] {
            Condition::Threshold(condition) => {
                // The stream engine restarts a rule on content update, so an
                // unlock that coincides with a content change needs no
                // separate start; issuing both would double-fire.
                if update_state && new_rule.admin_state == AdminState::Unlocked && update_content {
                    update_state = false;
                }

                if update_content {
                    let def = threshold_rule(
                        &name,
                        &new_rule.id,
                        index,
                        condition,
                        &self.stream_name,
                        &self.callback,
                    );
                    self.stream.update_rule(&def).await?;
                }
                if update_state {
                    if new_rule.admin_state == AdminState::Unlocked {
                        self.stream.restart_rule(&name).await?;
                    } else {
                        self.stream.stop_rule(&name).await?;
                    }
                }
            }
            Condition::Schedule(condition) => {
                if update_content {
                    self.scheduler
                        .update_interval(self.interval_for(&name, condition))
                        .await?;
                }
                if update_state {
                    self.scheduler
                        .update_interval_action(self.interval_action_for(new_rule, &name, index))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn remove_condition(&self, rule: &Rule, index: usize) -> EngineResult<()> {
        let name = resource_name(&rule.id, index);
        debug!(resource = %name, "removing condition resource");

        match &rule.conditions[index] {
            Condition::Threshold(_) => {
                self.stream.drop_rule(&name).await?;
            }
            Condition::Schedule(_) => {
                self.scheduler.delete_interval_action(&name).await?;
                self.scheduler.delete_interval(&name).await?;
            }
        }
        Ok(())
    }

    fn interval_for(&self, name: &str, condition: &ScheduleCondition) -> Interval {
        Interval {
            name: name.to_string(),
            start: condition.start_time.clone(),
            end: condition.end_time.clone(),
            interval: condition.interval_time.clone(),
        }
    }

    fn interval_action_for(&self, rule: &Rule, name: &str, index: usize) -> IntervalAction {
        IntervalAction {
            name: name.to_string(),
            interval_name: name.to_string(),
            admin_state: rule.admin_state,
            address: RestAddress::post(
                self.callback.host.clone(),
                self.callback.port,
                CallbackTarget::rule_path(&rule.id),
            ),
            content_type: "application/json".to_string(),
            content: format!("{{\"triggerState\":true,\"triggerIndex\":{}}}", index),
        }
    }
}
