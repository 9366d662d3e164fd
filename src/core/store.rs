// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{defs, utils};

/// Persistent copy of the hide list and the enabled flag.
pub trait HideStore: Send + Sync {
    /// All `(package_name, process)` rows.
    fn load_entries(&self) -> Result<Vec<(String, String)>>;
    fn insert_entry(&self, owner: &str, process: &str) -> Result<()>;
    /// Deletes every row of `owner`, or only the exact pair.
    fn delete_entries(&self, owner: &str, process: Option<&str>) -> Result<()>;
    fn hide_enabled(&self) -> Result<bool>;
    fn set_hide_enabled(&self, enabled: bool) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HideRow {
    package_name: String,
    process: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    hidelist: Vec<HideRow>,
    #[serde(default)]
    settings: BTreeMap<String, i32>,
}

/// JSON file backend. Every mutation rewrites the file atomically.
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<StoreFile> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read store {}", self.path.display()))
            }
        }
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            utils::ensure_dir_exists(parent)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        utils::atomic_write(&self.path, json)
            .with_context(|| format!("Failed to write store {}", self.path.display()))
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StoreFile),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.read()?;
        mutate(&mut file);
        self.write(&file)
    }
}

impl HideStore for JsonStore {
    fn load_entries(&self) -> Result<Vec<(String, String)>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read()?
            .hidelist
            .into_iter()
            .map(|row| (row.package_name, row.process))
            .collect())
    }

    fn insert_entry(&self, owner: &str, process: &str) -> Result<()> {
        let row = HideRow {
            package_name: owner.to_string(),
            process: process.to_string(),
        };
        self.update(|file| {
            if !file.hidelist.contains(&row) {
                file.hidelist.push(row);
            }
        })
    }

    fn delete_entries(&self, owner: &str, process: Option<&str>) -> Result<()> {
        self.update(|file| {
            file.hidelist.retain(|row| {
                !(row.package_name == owner && process.is_none_or(|p| row.process == p))
            });
        })
    }

    fn hide_enabled(&self) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read()?
            .settings
            .get(defs::HIDE_SETTING_KEY)
            .is_some_and(|v| *v != 0))
    }

    fn set_hide_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|file| {
            file.settings
                .insert(defs::HIDE_SETTING_KEY.to_string(), i32::from(enabled));
        })
    }
}
