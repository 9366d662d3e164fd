// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub const CONFIG_FILE: &str = "/data/adb/shroud/config.toml";
pub const STORE_FILE: &str = "/data/adb/shroud/hidelist.json";
pub const DAEMON_LOG_FILE: &str = "/data/adb/shroud/daemon.log";
pub const SOCKET_PATH: &str = "/dev/socket/shroud";

pub const PROC_DIR: &str = "/proc";
pub const MNT_NS_PATH: &str = "/proc/self/ns/mnt";
// Device-encrypted app data, readable before first unlock.
pub const APP_DATA_DIR: &str = "/data/user_de";
pub const SYSTEM_DIR: &str = "/data/system";
pub const PACKAGES_FILE: &str = "packages.xml";
pub const DEFAULT_STAGING_DIR: &str = "/sbin";

pub const ISOLATED_MAGIC: &str = "isolated";
pub const PER_USER_RANGE: u32 = 100_000;
pub const FIRST_ISOLATED_APP_ID: u32 = 90_000;
pub const MIN_PREFIX_LEN: usize = 15;

pub const GMS_PKG: &str = "com.google.android.gms";
pub const SNET_PROC: &str = "com.google.android.gms.unstable";
pub const WEBVIEW_ZYGOTE: &str = "webview_zygote";
pub const USAP_POOLS: [&str; 2] = ["usap32", "usap64"];
pub const APP_ZYGOTE_SUFFIX: &str = "_zygote";
pub const USAP_MIN_SDK: u32 = 29;

pub const MANAGER_PKG: &str = "com.topjohnwu.magisk";

pub const HIDE_SETTING_KEY: &str = "magiskhide";
