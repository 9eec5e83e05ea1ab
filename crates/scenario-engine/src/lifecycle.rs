//! Rule lifecycle orchestration
//!
//! Sequences the multi-step Add/Update/Delete flows across the external
//! registry, the condition synchronizer, and the cache, and reconciles the
//! cache from the registry at startup. The cache is committed last, so it
//! only ever reflects rules whose external world already converged (Delete
//! is the deliberate exception: it proceeds best-effort so a flaky
//! downstream can never make a rule undeletable).
//!
//! Concurrent requests for the same rule name are serialized with a keyed
//! mutex held across the whole sequence; requests for different names run
//! fully concurrently. A key's mutex lives only while requests hold it:
//! the last holder removes the entry on release, so request traffic does
//! not grow the map without bound.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scenario_clients::{RegistryClient, RegistryEntry};
use scenario_core::{properties, AdminState, Rule, RulePatch};
use scenario_store::RuleStore;

use crate::error::{EngineError, EngineResult};
use crate::sync::ConditionSynchronizer;

/// Registry profile tagging entries that hold automation rules
pub const RULE_PROFILE: &str = "AutomationRule";

/// This service's name, used as registry owner and notification sender
pub const SERVICE_NAME: &str = "scenario";

/// Orchestrates rule Add/Update/Delete and startup reconciliation
pub struct RuleService {
    store: Arc<RuleStore>,
    synchronizer: Arc<ConditionSynchronizer>,
    registry: Arc<dyn RegistryClient>,
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RuleService {
    pub fn new(
        store: Arc<RuleStore>,
        synchronizer: Arc<ConditionSynchronizer>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        Self {
            store,
            synchronizer,
            registry,
            name_locks: DashMap::new(),
        }
    }

    /// Add a new rule
    ///
    /// Generates an id when absent and forces the rule unlocked (creating
    /// conditions always unlocks). External resources are provisioned and
    /// the registry written before the cache commits; a registry failure
    /// after provisioning leaks the provisioned resources until the next
    /// startup sweep.
    pub async fn add_rule(&self, mut rule: Rule) -> EngineResult<Rule> {
        rule.validate()?;

        if rule.id.is_empty() {
            rule.id = Uuid::new_v4().to_string();
        }

        let name = rule.name.clone();
        let lock = self.name_lock(&name);
        let guard = lock.lock().await;
        let result = self.add_rule_locked(rule).await;
        drop(guard);
        drop(lock);
        self.release_name_lock(&name);
        result
    }

    async fn add_rule_locked(&self, mut rule: Rule) -> EngineResult<Rule> {
        if self.store.for_name(&rule.name).is_some() {
            return Err(EngineError::Conflict(rule.name));
        }

        rule.admin_state = AdminState::Unlocked;
        debug!(rule = %rule.name, "adding rule");

        self.synchronizer.provision(&rule).await?;
        self.registry.add_entry(entry_from_rule(&rule)).await?;
        self.store.add(rule.clone());

        info!(rule = %rule.name, id = %rule.id, "rule added");
        Ok(rule)
    }

    /// All committed rules
    pub fn all_rules(&self) -> Vec<Rule> {
        self.store.all()
    }

    /// Look up one rule by name
    pub fn rule_by_name(&self, name: &str) -> EngineResult<Rule> {
        self.store
            .for_name(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// Apply a partial update to the named rule
    ///
    /// Omitted fields inherit the stored value. Changing conditions forces
    /// the rule unlocked; external resources are reconciled only when the
    /// conditions or the admin state changed. The cache commits last.
    pub async fn update_rule_by_name(&self, name: &str, patch: RulePatch) -> EngineResult<Rule> {
        let lock = self.name_lock(name);
        let guard = lock.lock().await;
        let result = self.update_rule_locked(name, patch).await;
        drop(guard);
        drop(lock);
        self.release_name_lock(name);
        result
    }

    async fn update_rule_locked(&self, name: &str, patch: RulePatch) -> EngineResult<Rule> {
        let old_rule = self
            .store
            .for_name(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;

        let mut rule = Rule::apply_patch(&old_rule, patch);

        if rule.name != old_rule.name && self.store.for_name(&rule.name).is_some() {
            return Err(EngineError::Conflict(rule.name));
        }

        let conditions_changed = rule.conditions != old_rule.conditions;
        if conditions_changed {
            rule.admin_state = AdminState::Unlocked;
        }
        rule.validate()?;

        debug!(rule = %rule.name, id = %rule.id, "updating rule");

        if conditions_changed || rule.admin_state != old_rule.admin_state {
            self.synchronizer.reconcile(&rule, &old_rule).await?;
        }

        self.registry.update_entry(entry_from_rule(&rule)).await?;
        self.store.update(rule.clone());

        info!(rule = %rule.name, id = %rule.id, "rule updated");
        Ok(rule)
    }

    /// Delete the named rule
    ///
    /// Deprovision failures are logged and tolerated so a flaky downstream
    /// cannot leave the rule permanently stuck; the startup sweep collects
    /// whatever was left behind. Registry removal failures are fatal.
    pub async fn delete_rule_by_name(&self, name: &str) -> EngineResult<()> {
        let lock = self.name_lock(name);
        let guard = lock.lock().await;
        let result = self.delete_rule_locked(name).await;
        drop(guard);
        drop(lock);
        self.release_name_lock(name);
        result
    }

    async fn delete_rule_locked(&self, name: &str) -> EngineResult<()> {
        let rule = self
            .store
            .for_name(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;

        debug!(rule = %rule.name, "deleting rule");

        if let Err(err) = self.synchronizer.deprovision(&rule).await {
            warn!(rule = %rule.name, %err, "deprovision incomplete, continuing delete");
        }

        self.registry.delete_by_name(name).await?;
        self.store.remove_by_name(name);

        info!(rule = %name, "rule deleted");
        Ok(())
    }

    /// Rebuild the cache from the registry at startup
    ///
    /// Entries that fail to decode into a valid rule are orphans: they are
    /// removed from the registry (best-effort) and never enter the cache -
    /// the cache must not hold a rule it cannot fully explain. Afterwards,
    /// external resources with no cached owner are swept.
    pub async fn reconcile_startup(&self) -> EngineResult<usize> {
        let entries = self.registry.entries_for_profile(RULE_PROFILE).await?;
        let mut loaded = 0;

        for entry in entries {
            match rule_from_entry(&entry) {
                Some(rule) => {
                    debug!(rule = %rule.name, "loaded rule from registry");
                    self.store.add(rule);
                    loaded += 1;
                }
                None => {
                    warn!(entry = %entry.name, "registry entry is not a valid rule, removing");
                    if let Err(err) = self.registry.delete_by_name(&entry.name).await {
                        warn!(entry = %entry.name, %err, "failed to remove orphaned entry");
                    }
                }
            }
        }

        self.synchronizer.sweep_orphans(&self.store).await;

        info!(loaded, "startup reconciliation complete");
        Ok(loaded)
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.name_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_name_lock(&self, name: &str) {
        // Only the map's own handle left: no concurrent request holds this
        // lock, so the entry can go. The count check and any concurrent
        // clone in name_lock are serialized by the map's shard lock.
        self.name_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Serialize a rule into its durable registry form
fn entry_from_rule(rule: &Rule) -> RegistryEntry {
    RegistryEntry {
        id: rule.id.clone(),
        name: rule.name.clone(),
        description: rule.description.clone(),
        admin_state: rule.admin_state,
        operating_state: "UP".to_string(),
        profile_name: RULE_PROFILE.to_string(),
        service_name: SERVICE_NAME.to_string(),
        properties: properties::rule_to_properties(rule),
    }
}

/// Decode a registry entry back into a rule, `None` if it is not one
fn rule_from_entry(entry: &RegistryEntry) -> Option<Rule> {
    properties::rule_from_properties(
        &entry.id,
        &entry.name,
        &entry.description,
        entry.admin_state,
        &entry.properties,
    )
}
