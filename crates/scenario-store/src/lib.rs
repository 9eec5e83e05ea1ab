//! Concurrent rule catalog with per-condition trigger state
//!
//! This crate provides the RuleStore, the cache of committed rules together
//! with the latched boolean state of every condition. The catalog (rules by
//! id), the name index, and the latch table live behind a single
//! reader/writer lock: a rule and its latch vector must never be observed in
//! an inconsistent combination, e.g. a latch vector sized for an old
//! condition count while the catalog already shows new conditions.
//!
//! Latch reads and writes for an unknown id or an out-of-range index are
//! deliberately forgiving: a late callback for a since-deleted rule or
//! condition reads `false` and mutates nothing.

use std::collections::HashMap;
use std::sync::RwLock;

use scenario_core::Rule;
use tracing::debug;

#[derive(Default)]
struct Inner {
    /// Committed rules keyed by id
    rules: HashMap<String, Rule>,
    /// Unique name -> id
    name_index: HashMap<String, String>,
    /// Latched condition state keyed by rule id, one slot per condition
    latches: HashMap<String, Vec<bool>>,
}

impl Inner {
    fn upsert(&mut self, rule: Rule) {
        // A rename must drop the old name mapping before the new one lands.
        if let Some(previous) = self.rules.get(&rule.id) {
            self.name_index.remove(&previous.name);
        }
        // A different rule already holding the name is displaced entirely,
        // latches included; it must not linger as a ghost in the catalog.
        if let Some(displaced) = self.name_index.remove(&rule.name) {
            self.rules.remove(&displaced);
            self.latches.remove(&displaced);
        }
        self.name_index.insert(rule.name.clone(), rule.id.clone());
        self.latches
            .insert(rule.id.clone(), vec![false; rule.conditions.len()]);
        self.rules.insert(rule.id.clone(), rule);
    }

    fn remove(&mut self, name: &str) {
        if let Some(id) = self.name_index.remove(name) {
            self.rules.remove(&id);
            self.latches.remove(&id);
        }
    }
}

/// The rule cache
///
/// All operations are safe under unbounded concurrent readers and writers.
/// The store owns the catalog and the latch table exclusively; no other
/// component mutates them directly.
pub struct RuleStore {
    inner: RwLock<Inner>,
}

impl RuleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a store seeded with reconciled rules
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().expect("rule store lock poisoned");
            for rule in rules {
                inner.upsert(rule);
            }
        }
        store
    }

    /// Whether a rule with this id is committed
    pub fn exists(&self, id: &str) -> bool {
        self.read().rules.contains_key(id)
    }

    /// Look up a rule by id
    pub fn for_id(&self, id: &str) -> Option<Rule> {
        self.read().rules.get(id).cloned()
    }

    /// Look up a rule by its unique name
    pub fn for_name(&self, name: &str) -> Option<Rule> {
        let inner = self.read();
        let id = inner.name_index.get(name)?;
        inner.rules.get(id).cloned()
    }

    /// All committed rules, sorted by name for stable output
    pub fn all(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.read().rules.values().cloned().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        rules
    }

    /// Number of committed rules
    pub fn count(&self) -> usize {
        self.read().rules.len()
    }

    /// Commit a newly added rule; its latch vector starts all-false
    ///
    /// Name uniqueness is enforced upstream by the lifecycle before calling
    /// this.
    pub fn add(&self, rule: Rule) {
        debug!(rule = %rule.name, "committing rule to cache");
        self.write().upsert(rule);
    }

    /// Replace a rule by id and reset its latch vector
    ///
    /// Condition semantics changed, so stale latches must not survive the
    /// update. Renames atomically swap the name mapping.
    pub fn update(&self, rule: Rule) {
        debug!(rule = %rule.name, "updating rule in cache");
        self.write().upsert(rule);
    }

    /// Remove a rule and its latch vector by name
    pub fn remove_by_name(&self, name: &str) {
        debug!(rule = %name, "removing rule from cache");
        self.write().remove(name);
    }

    /// Latch one condition's state
    ///
    /// No-op for an unknown id or out-of-range index.
    pub fn set_condition_state(&self, id: &str, index: usize, state: bool) {
        let mut inner = self.write();
        if let Some(latches) = inner.latches.get_mut(id) {
            if let Some(slot) = latches.get_mut(index) {
                *slot = state;
            }
        }
    }

    /// Read one condition's latched state
    ///
    /// `false` for an unknown id or out-of-range index.
    pub fn condition_state(&self, id: &str, index: usize) -> bool {
        self.read()
            .latches
            .get(id)
            .and_then(|latches| latches.get(index))
            .copied()
            .unwrap_or(false)
    }

    /// Snapshot of a rule's latch vector
    pub fn condition_states(&self, id: &str) -> Vec<bool> {
        self.read().latches.get(id).cloned().unwrap_or_default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("rule store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("rule store lock poisoned")
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_core::{Action, CombineLogic, Condition, ThresholdCondition, ThresholdOperator};

    fn threshold_condition() -> Condition {
        Condition::Threshold(ThresholdCondition {
            logic: CombineLogic::And,
            device_threshold: "sensor-1".to_string(),
            resource_threshold: "temperature".to_string(),
            operator_threshold: ThresholdOperator::Greater,
            value_threshold: "30".to_string(),
        })
    }

    fn rule(id: &str, name: &str, condition_count: usize) -> Rule {
        Rule {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            admin_state: Default::default(),
            notify_enable: false,
            conditions: (0..condition_count).map(|_| threshold_condition()).collect(),
            actions: vec![Action {
                device_name: "fan-1".to_string(),
                command_name: "setSpeed".to_string(),
                body: r#"{"speed":"high"}"#.to_string(),
            }],
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let store = RuleStore::new();
        store.add(rule("id-1", "r1", 2));

        assert!(store.exists("id-1"));
        assert_eq!(store.for_id("id-1").unwrap().name, "r1");
        assert_eq!(store.for_name("r1").unwrap().id, "id-1");
        assert!(store.for_name("missing").is_none());
    }

    #[test]
    fn test_no_two_rules_share_a_name() {
        let store = RuleStore::new();
        store.add(rule("id-1", "r1", 1));
        store.set_condition_state("id-1", 0, true);
        store.add(rule("id-2", "r1", 1));

        // Last writer wins on the name; the displaced rule is gone entirely.
        assert_eq!(store.for_name("r1").unwrap().id, "id-2");
        assert!(!store.exists("id-1"));
        assert!(store.for_id("id-1").is_none());
        assert!(store.condition_states("id-1").is_empty());
        assert_eq!(store.count(), 1);

        let names: Vec<String> = store.all().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["r1"]);
    }

    #[test]
    fn test_update_resets_latches() {
        let store = RuleStore::new();
        store.add(rule("id-1", "r1", 3));
        store.set_condition_state("id-1", 0, true);
        store.set_condition_state("id-1", 2, true);

        store.update(rule("id-1", "r1", 3));
        for index in 0..3 {
            assert!(!store.condition_state("id-1", index));
        }
    }

    #[test]
    fn test_rename_swaps_name_mapping() {
        let store = RuleStore::new();
        store.add(rule("id-1", "old-name", 1));

        store.update(rule("id-1", "new-name", 1));
        assert!(store.for_name("old-name").is_none());
        assert_eq!(store.for_name("new-name").unwrap().id, "id-1");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_unknown_id_and_out_of_range_index_are_benign() {
        let store = RuleStore::new();
        store.add(rule("id-1", "r1", 1));

        assert!(!store.condition_state("missing", 0));
        assert!(!store.condition_state("id-1", 5));

        store.set_condition_state("missing", 0, true);
        store.set_condition_state("id-1", 5, true);
        assert!(!store.condition_state("id-1", 5));
    }

    #[test]
    fn test_remove_by_name() {
        let store = RuleStore::new();
        store.add(rule("id-1", "r1", 2));
        store.set_condition_state("id-1", 0, true);

        store.remove_by_name("r1");
        assert!(!store.exists("id-1"));
        assert!(store.condition_states("id-1").is_empty());

        // Removing again is a no-op.
        store.remove_by_name("r1");
    }

    #[test]
    fn test_all_sorted_by_name() {
        let store = RuleStore::new();
        store.add(rule("id-2", "beta", 1));
        store.add(rule("id-1", "alpha", 1));

        let names: Vec<String> = store.all().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        use std::sync::Arc;

        let store = Arc::new(RuleStore::new());
        let mut handles = Vec::new();

        for n in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("id-{}", n);
                    store.add(rule(&id, &format!("rule-{}", n), 2));
                    store.set_condition_state(&id, i % 2, true);
                    let _ = store.condition_state(&id, 0);
                    let _ = store.for_name(&format!("rule-{}", n));
                    let _ = store.all();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count(), 8);
    }
}
