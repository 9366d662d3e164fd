// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::BTreeMap,
    fs,
    os::unix::fs::MetadataExt,
    path::Path,
};

use walkdir::WalkDir;

use crate::core::entry::{HideEntry, Owner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    App(u32),
    Isolated,
}

/// Uid layout knobs. Both are properties of the OS release.
#[derive(Debug, Clone, Copy)]
pub struct UidLayout {
    pub per_user_range: u32,
    pub first_isolated_app_id: u32,
}

impl UidLayout {
    pub fn to_app_id(&self, uid: u32) -> u32 {
        uid % self.per_user_range
    }

    pub fn key_for_uid(&self, uid: u32) -> IndexKey {
        let app_id = self.to_app_id(uid);
        if app_id >= self.first_isolated_app_id {
            IndexKey::Isolated
        } else {
            IndexKey::App(app_id)
        }
    }
}

/// App id -> process names to hide. Only ever replaced wholesale.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentityIndex {
    map: BTreeMap<IndexKey, Vec<String>>,
}

impl IdentityIndex {
    /// Resolves every entry to an index key. `resolve(user, package)` yields
    /// the owning uid of that package's data directory for one user.
    pub fn build<'a, I, F>(entries: I, users: &[String], layout: UidLayout, mut resolve: F) -> Self
    where
        I: IntoIterator<Item = &'a HideEntry>,
        F: FnMut(&str, &str) -> Option<u32>,
    {
        let mut map: BTreeMap<IndexKey, Vec<String>> = BTreeMap::new();
        let mut prev: Option<(&str, u32)> = None;

        for entry in entries {
            let pkg = match &entry.owner {
                Owner::IsolatedClass => {
                    map.entry(IndexKey::Isolated)
                        .or_default()
                        .push(entry.process.clone());
                    continue;
                }
                Owner::Package(pkg) => pkg.as_str(),
            };

            let app_id = match prev {
                Some((prev_pkg, app_id)) if prev_pkg == pkg => Some(app_id),
                _ => users
                    .iter()
                    .find_map(|user| resolve(user, pkg))
                    .map(|uid| layout.to_app_id(uid)),
            };

            match app_id {
                Some(app_id) => {
                    prev = Some((pkg, app_id));
                    map.entry(IndexKey::App(app_id))
                        .or_default()
                        .push(entry.process.clone());
                }
                None => log::debug!("hide: no data dir for [{}], skipped", pkg),
            }
        }

        Self { map }
    }

    /// Builds the index against the real app data tree.
    pub fn build_from_fs(entries: &[HideEntry], app_data_dir: &Path, layout: UidLayout) -> Self {
        let users = list_users(app_data_dir);
        if users.is_empty() {
            return Self::default();
        }

        Self::build(entries, &users, layout, |user, pkg| {
            package_uid(app_data_dir, user, pkg)
        })
    }

    pub fn get(&self, key: IndexKey) -> Option<&[String]> {
        self.map.get(&key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Checks whether `process` running as `uid` is a hide target.
    /// Stored names may also match as a prefix of `process` when both are
    /// longer than `min_len`, since a name observed mid-write can be cut.
    pub fn is_target(&self, layout: UidLayout, uid: u32, process: &str, min_len: usize) -> bool {
        let key = layout.key_for_uid(uid);
        let Some(names) = self.get(key) else {
            return false;
        };

        names.iter().any(|s| {
            if s.len() > min_len && process.len() > min_len && s.starts_with(process) {
                return true;
            }
            match key {
                IndexKey::Isolated => process.starts_with(s.as_str()),
                IndexKey::App(_) => s == process,
            }
        })
    }
}

/// App id of `pkg` from the first user that has it installed.
pub fn package_app_id(app_data_dir: &Path, pkg: &str, layout: UidLayout) -> Option<u32> {
    list_users(app_data_dir)
        .iter()
        .find_map(|user| package_uid(app_data_dir, user, pkg))
        .map(|uid| layout.to_app_id(uid))
}

fn package_uid(app_data_dir: &Path, user: &str, pkg: &str) -> Option<u32> {
    fs::metadata(app_data_dir.join(user).join(pkg))
        .ok()
        .map(|m| m.uid())
}

fn list_users(app_data_dir: &Path) -> Vec<String> {
    WalkDir::new(app_data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::defs;

    const LAYOUT: UidLayout = UidLayout {
        per_user_range: defs::PER_USER_RANGE,
        first_isolated_app_id: defs::FIRST_ISOLATED_APP_ID,
    };

    fn entry(owner: &str, process: &str) -> HideEntry {
        HideEntry::new(owner, process).unwrap()
    }

    #[test]
    fn app_id_strips_user() {
        assert_eq!(LAYOUT.to_app_id(10010), 10010);
        assert_eq!(LAYOUT.to_app_id(1_010_110), 10110);
        assert_eq!(LAYOUT.key_for_uid(1_090_005), IndexKey::Isolated);
        assert_eq!(LAYOUT.key_for_uid(10_089_999), IndexKey::App(89_999));
    }

    #[test]
    fn first_user_with_the_package_wins() {
        let users = vec!["0".to_string(), "10".to_string()];
        let entries = [entry("com.a", "p1")];

        let index = IdentityIndex::build(&entries, &users, LAYOUT, |user, pkg| {
            match (user, pkg) {
                ("0", "com.a") => Some(10010),
                ("10", "com.a") => Some(1_010_110),
                _ => None,
            }
        });
        assert_eq!(index.get(IndexKey::App(10010)), Some(&["p1".to_string()][..]));
        assert_eq!(index.len(), 1);

        // Only installed for the secondary user.
        let index = IdentityIndex::build(&entries, &users, LAYOUT, |user, _| {
            (user == "10").then_some(1_010_110)
        });
        assert_eq!(index.get(IndexKey::App(10110)), Some(&["p1".to_string()][..]));
    }

    #[test]
    fn missing_packages_are_dropped() {
        let users = vec!["0".to_string()];
        let entries = [entry("com.gone", "p"), entry(defs::ISOLATED_MAGIC, "iso")];
        let index = IdentityIndex::build(&entries, &users, LAYOUT, |_, _| None);

        assert!(index.get(IndexKey::App(0)).is_none());
        assert_eq!(index.get(IndexKey::Isolated), Some(&["iso".to_string()][..]));
    }

    #[test]
    fn repeated_owner_is_resolved_once() {
        let users = vec!["0".to_string()];
        let entries = [entry("com.a", "p1"), entry("com.a", "p2"), entry("com.b", "q")];
        let mut lookups = 0;
        let index = IdentityIndex::build(&entries, &users, LAYOUT, |_, pkg| {
            lookups += 1;
            Some(if pkg == "com.a" { 10001 } else { 10002 })
        });

        assert_eq!(lookups, 2);
        assert_eq!(index.get(IndexKey::App(10001)).map(<[_]>::len), Some(2));
        assert_eq!(index.get(IndexKey::App(10002)).map(<[_]>::len), Some(1));
    }

    #[test]
    fn builds_from_data_dir_ownership() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("0/com.a")).unwrap();
        let uid = fs::metadata(dir.path().join("0/com.a")).unwrap().uid();

        let entries = [entry("com.a", "com.a"), entry("com.missing", "x")];
        let index = IdentityIndex::build_from_fs(&entries, dir.path(), LAYOUT);

        let key = LAYOUT.key_for_uid(uid);
        assert_eq!(index.get(key), Some(&["com.a".to_string()][..]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn package_app_id_uses_first_user_with_package() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("0")).unwrap();
        fs::create_dir_all(dir.path().join("10/com.mgr")).unwrap();
        let uid = fs::metadata(dir.path().join("10/com.mgr")).unwrap().uid();

        assert_eq!(
            package_app_id(dir.path(), "com.mgr", LAYOUT),
            Some(LAYOUT.to_app_id(uid))
        );
        assert_eq!(package_app_id(dir.path(), "com.none", LAYOUT), None);
    }

    #[test]
    fn unreadable_data_root_gives_empty_index() {
        let entries = [entry("com.a", "p")];
        let index =
            IdentityIndex::build_from_fs(&entries, Path::new("/nonexistent/user_de"), LAYOUT);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn isolated_matching_goes_both_ways() {
        let users: Vec<String> = Vec::new();
        let entries = [entry(defs::ISOLATED_MAGIC, "proc_abc")];
        let index = IdentityIndex::build(&entries, &users, LAYOUT, |_, _| None);
        let iso_uid = 99_123;

        assert!(index.is_target(LAYOUT, iso_uid, "proc_abc123", 4));
        assert!(index.is_target(LAYOUT, iso_uid, "proc_a", 4));
        // Too short to trust a truncated name.
        assert!(!index.is_target(LAYOUT, iso_uid, "proc", 4));
        assert!(!index.is_target(LAYOUT, iso_uid, "other_abc", 4));
        // Not an isolated uid.
        assert!(!index.is_target(LAYOUT, 10_123, "proc_abc123", 4));
    }

    #[test]
    fn app_matching_is_exact_with_gated_prefix() {
        let users = vec!["0".to_string()];
        let entries = [entry("com.example.app", "com.example.app:remote")];
        let index = IdentityIndex::build(&entries, &users, LAYOUT, |_, _| Some(10_050));

        assert!(index.is_target(LAYOUT, 10_050, "com.example.app:remote", 15));
        assert!(index.is_target(LAYOUT, 1_010_050, "com.example.app:rem", 15));
        assert!(!index.is_target(LAYOUT, 10_050, "com.example", 15));
        assert!(!index.is_target(LAYOUT, 10_050, "com.example.app:remote2", 15));
        assert!(!index.is_target(LAYOUT, 10_051, "com.example.app:remote", 15));
    }
}
