//! Bounded LRU cache of compiled rule patterns.
//!
//! Rules are immutable once stored, so an entry keyed by `(rule_type,
//! rule_value)` stays valid for the lifetime of the process and the cache
//! never needs invalidation. Results are identical with the cache disabled.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::models::{Rule, RuleKey};
use crate::rule_pattern::RulePattern;

/// Default number of compiled patterns kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<RuleKey, (Arc<RulePattern>, u64)>,
    /// Last-use tick to key, oldest first.
    recency: BTreeMap<u64, RuleKey>,
    tick: u64,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &RuleKey) -> Option<Arc<RulePattern>> {
        let tick = self.next_tick();
        let (pattern, last_used) = self.entries.get_mut(key)?;
        self.recency.remove(&*last_used);
        *last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(Arc::clone(pattern))
    }

    fn insert(&mut self, key: RuleKey, pattern: Arc<RulePattern>, capacity: usize) {
        if let Some((_, old_tick)) = self.entries.remove(&key) {
            self.recency.remove(&old_tick);
        }

        while self.entries.len() >= capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }

        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.entries.insert(key, (pattern, tick));
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

/// Thread-safe cache from rule identity to compiled pattern.
#[derive(Debug)]
pub struct RuleMatchCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl Default for RuleMatchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl RuleMatchCache {
    /// Creates a cache holding at most `capacity` patterns.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
        }
    }

    /// Creates a cache that stores nothing; every lookup compiles.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the compiled pattern for `rule`, compiling it on a miss.
    pub fn get_or_compile(&self, rule: &Rule) -> Arc<RulePattern> {
        if self.capacity == 0 {
            return Arc::new(RulePattern::from_rule(rule));
        }

        let key = rule.key();
        if let Ok(mut state) = self.state.lock() {
            if let Some(pattern) = state.get(&key) {
                return pattern;
            }
        }

        let pattern = Arc::new(RulePattern::from_rule(rule));
        if let Ok(mut state) = self.state.lock() {
            state.insert(key, Arc::clone(&pattern), self.capacity);
        }
        pattern
    }

    /// Returns true if `rule` currently has a cached pattern.
    pub fn contains(&self, rule: &Rule) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains_key(&rule.key()))
            .unwrap_or(false)
    }

    /// Number of cached patterns.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached pattern.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.clear();
        }
    }
}
