// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{core::index::UidLayout, defs, utils};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UidConfig {
    #[serde(default = "default_per_user_range")]
    pub per_user_range: u32,
    #[serde(default = "default_first_isolated_app_id")]
    pub first_isolated_app_id: u32,
}

fn default_per_user_range() -> u32 {
    defs::PER_USER_RANGE
}

fn default_first_isolated_app_id() -> u32 {
    defs::FIRST_ISOLATED_APP_ID
}

impl Default for UidConfig {
    fn default() -> Self {
        Self {
            per_user_range: default_per_user_range(),
            first_isolated_app_id: default_first_isolated_app_id(),
        }
    }
}

impl From<&UidConfig> for UidLayout {
    fn from(cfg: &UidConfig) -> Self {
        Self {
            per_user_range: cfg.per_user_range.max(1),
            first_isolated_app_id: cfg.first_isolated_app_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HideConfig {
    #[serde(default = "default_proc_dir")]
    pub proc_dir: PathBuf,
    /// Checked before enabling; hiding needs mount namespaces.
    #[serde(default = "default_mnt_ns_path")]
    pub mnt_ns_path: PathBuf,
    #[serde(default = "default_app_data_dir")]
    pub app_data_dir: PathBuf,
    #[serde(default = "default_system_dir")]
    pub system_dir: PathBuf,
    #[serde(default = "default_packages_file")]
    pub packages_file: String,
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    #[serde(default = "default_manager_package")]
    pub manager_package: String,
    /// Whether the injection layer is active. Without it only bookkeeping
    /// is done: no kills, no property rewrites, no index.
    #[serde(default = "default_true")]
    pub injection: bool,
    /// 0 reads `ro.build.version.sdk`.
    #[serde(default)]
    pub sdk_int: u32,
    #[serde(default)]
    pub uid: UidConfig,
    #[serde(default = "default_min_prefix_len")]
    pub min_prefix_len: usize,
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_proc_dir() -> PathBuf {
    PathBuf::from(defs::PROC_DIR)
}

fn default_mnt_ns_path() -> PathBuf {
    PathBuf::from(defs::MNT_NS_PATH)
}

fn default_manager_package() -> String {
    defs::MANAGER_PKG.to_string()
}

fn default_app_data_dir() -> PathBuf {
    PathBuf::from(defs::APP_DATA_DIR)
}

fn default_system_dir() -> PathBuf {
    PathBuf::from(defs::SYSTEM_DIR)
}

fn default_packages_file() -> String {
    defs::PACKAGES_FILE.to_string()
}

fn default_store_file() -> PathBuf {
    PathBuf::from(defs::STORE_FILE)
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(defs::SOCKET_PATH)
}

fn default_staging_dir() -> String {
    defs::DEFAULT_STAGING_DIR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_prefix_len() -> usize {
    defs::MIN_PREFIX_LEN
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

fn default_log_file() -> PathBuf {
    PathBuf::from(defs::DAEMON_LOG_FILE)
}

impl Default for HideConfig {
    fn default() -> Self {
        Self {
            proc_dir: default_proc_dir(),
            mnt_ns_path: default_mnt_ns_path(),
            app_data_dir: default_app_data_dir(),
            system_dir: default_system_dir(),
            packages_file: default_packages_file(),
            store_file: default_store_file(),
            socket_path: default_socket_path(),
            staging_dir: default_staging_dir(),
            manager_package: default_manager_package(),
            injection: true,
            sdk_int: 0,
            uid: UidConfig::default(),
            min_prefix_len: default_min_prefix_len(),
            monitor_interval_ms: default_monitor_interval_ms(),
            log_file: default_log_file(),
        }
    }
}

impl HideConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).context("failed to read config file")?;

        let config: HideConfig = toml::from_str(&content).context("failed to parse config file")?;

        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        Self::from_file(defs::CONFIG_FILE)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        fs::write(path.as_ref(), content).context("failed to write config file")?;

        Ok(())
    }

    /// Fills in values that are read from the device when left unset.
    pub fn resolve(mut self) -> Self {
        if self.sdk_int == 0 {
            self.sdk_int = utils::sdk_int();
        }
        self
    }

    pub fn uid_layout(&self) -> UidLayout {
        UidLayout::from(&self.uid)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(10))
    }

    pub fn staging_is_default(&self) -> bool {
        self.staging_dir == defs::DEFAULT_STAGING_DIR
    }
}
