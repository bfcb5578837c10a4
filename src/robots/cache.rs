//! Per-session robots.txt cache
//!
//! Rules are fetched at most once per origin per crawl run. The cache is owned
//! by a single [`RobotsGate`](crate::robots::RobotsGate), never shared across
//! crawls.

use crate::robots::RobotsRuleset;
use std::collections::HashMap;
use std::sync::Arc;

/// Origin-keyed store of robots rules
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, Arc<RobotsRuleset>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for an origin key (`scheme://host[:port]`)
    pub fn get(&self, origin: &str) -> Option<Arc<RobotsRuleset>> {
        self.entries.get(origin).cloned()
    }

    /// Stores rules for an origin, keeping the first entry if one already exists
    pub fn insert(&mut self, origin: &str, rules: RobotsRuleset) -> Arc<RobotsRuleset> {
        let cached = self
            .entries
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(rules));
        Arc::clone(cached)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
