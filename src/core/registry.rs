// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeSet;

use crate::core::entry::{HideEntry, Owner};

/// Ordered set of hide targets. Sorting keeps entries of one owner adjacent,
/// which the index rebuild relies on.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: BTreeSet<HideEntry>,
}

impl Registry {
    pub fn contains(&self, entry: &HideEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Returns false if the entry was already present.
    pub fn insert(&mut self, entry: HideEntry) -> bool {
        log::info!("hide_list add: [{}/{}]", entry.owner, entry.process);
        self.entries.insert(entry)
    }

    /// Removes every entry of `owner` when `process` is `None`, otherwise the
    /// exact pair. Returns the removed entries.
    pub fn remove(&mut self, owner: &Owner, process: Option<&str>) -> Vec<HideEntry> {
        let removed: Vec<HideEntry> = self
            .entries
            .iter()
            .filter(|e| &e.owner == owner && process.is_none_or(|p| e.process == p))
            .cloned()
            .collect();

        for entry in &removed {
            log::info!("hide_list rm: [{}/{}]", entry.owner, entry.process);
            self.entries.remove(entry);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> Vec<HideEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(owner: &str, process: &str) -> HideEntry {
        HideEntry::new(owner, process).unwrap()
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut reg = Registry::default();
        assert!(reg.insert(entry("com.a", "p1")));
        assert!(!reg.insert(entry("com.a", "p1")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_by_owner_leaves_others() {
        let mut reg = Registry::default();
        reg.insert(entry("com.a", "p1"));
        reg.insert(entry("com.a", "p2"));
        reg.insert(entry("com.b", "p1"));

        let removed = reg.remove(&Owner::parse("com.a"), None);
        assert_eq!(removed.len(), 2);
        assert_eq!(reg.snapshot(), vec![entry("com.b", "p1")]);
    }

    #[test]
    fn remove_exact_pair() {
        let mut reg = Registry::default();
        reg.insert(entry("com.a", "p1"));
        reg.insert(entry("com.a", "p2"));

        assert_eq!(reg.remove(&Owner::parse("com.a"), Some("p2")).len(), 1);
        assert!(reg.remove(&Owner::parse("com.a"), Some("p3")).is_empty());
        assert!(reg.contains(&entry("com.a", "p1")));
    }

    #[test]
    fn owners_stay_adjacent() {
        let mut reg = Registry::default();
        reg.insert(entry("com.b", "x"));
        reg.insert(entry("com.a", "z"));
        reg.insert(entry("com.b", "a"));
        reg.insert(entry("com.a", "a"));

        let owners: Vec<String> = reg
            .snapshot()
            .into_iter()
            .map(|e| e.owner.to_string())
            .collect();
        assert_eq!(owners, ["com.a", "com.a", "com.b", "com.b"]);
    }
}
