// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::core::host::PropertyHider;

/// Properties that give away an unlocked or debug build, with the value a
/// stock locked device reports.
const SENSITIVE_PROPS: &[(&str, &str)] = &[
    ("ro.boot.vbmeta.device_state", "locked"),
    ("ro.boot.verifiedbootstate", "green"),
    ("ro.boot.flash.locked", "1"),
    ("ro.boot.veritymode", "enforcing"),
    ("ro.boot.warranty_bit", "0"),
    ("ro.warranty_bit", "0"),
    ("ro.debuggable", "0"),
    ("ro.secure", "1"),
    ("ro.build.type", "user"),
    ("ro.build.tags", "release-keys"),
    ("ro.vendor.boot.warranty_bit", "0"),
    ("ro.vendor.warranty_bit", "0"),
];

/// Set by vendor init only after boot has progressed.
const LATE_SENSITIVE_PROPS: &[(&str, &str)] = &[
    ("vendor.boot.vbmeta.device_state", "locked"),
    ("vendor.boot.verifiedbootstate", "green"),
];

const BOOT_MODE_PROPS: &[&str] = &["ro.bootmode", "ro.boot.mode"];
const LATE_BOOT_MODE_PROPS: &[&str] = &["vendor.boot.mode"];

/// Rewrites properties through the `resetprop` tool.
pub struct ResetProp {
    tool: String,
}

impl ResetProp {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    fn get(&self, name: &str) -> Option<String> {
        let output = Command::new("getprop").arg(name).output().ok()?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let status = Command::new(&self.tool)
            .args(["-n", name, value])
            .status()
            .with_context(|| format!("Failed to execute {}", self.tool))?;
        if !status.success() {
            bail!("{} {} failed", self.tool, name);
        }
        Ok(())
    }

    fn apply(&self, props: &[(&str, &str)], modes: &[&str]) {
        for (name, safe) in props {
            if let Some(current) = self.get(name)
                && needs_rewrite(&current, safe)
            {
                self.rewrite(name, safe);
            }
        }
        for name in modes {
            if let Some(current) = self.get(name)
                && let Some(safe) = boot_mode_replacement(&current)
            {
                self.rewrite(name, safe);
            }
        }
    }

    fn rewrite(&self, name: &str, value: &str) {
        log::debug!("hide: prop [{}] -> [{}]", name, value);
        if let Err(e) = self.set(name, value) {
            log::warn!("hide: {:#}", e);
        }
    }
}

impl PropertyHider for ResetProp {
    fn hide_sensitive(&self) {
        self.apply(SENSITIVE_PROPS, BOOT_MODE_PROPS);
    }

    fn hide_late_sensitive(&self) {
        self.apply(LATE_SENSITIVE_PROPS, LATE_BOOT_MODE_PROPS);
    }
}

/// Only properties that are present are touched; adding one would be a tell.
fn needs_rewrite(current: &str, safe: &str) -> bool {
    !current.is_empty() && current != safe
}

fn boot_mode_replacement(current: &str) -> Option<&'static str> {
    current.contains("recovery").then_some("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unsafe_values_are_rewritten() {
        assert!(needs_rewrite("1", "0"));
        assert!(needs_rewrite("userdebug", "user"));
        assert!(!needs_rewrite("user", "user"));
        assert!(!needs_rewrite("", "user"));
    }

    #[test]
    fn recovery_boot_mode_is_masked() {
        assert_eq!(boot_mode_replacement("recovery"), Some("unknown"));
        assert_eq!(boot_mode_replacement("normal"), None);
    }

    #[test]
    fn tables_have_no_duplicates() {
        let mut names: Vec<&str> = SENSITIVE_PROPS
            .iter()
            .chain(LATE_SENSITIVE_PROPS)
            .map(|(name, _)| *name)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
