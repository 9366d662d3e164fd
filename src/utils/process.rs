// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::Command;

/// Platform API level, 0 when it cannot be read (e.g. off-device).
pub fn sdk_int() -> u32 {
    Command::new("getprop")
        .arg("ro.build.version.sdk")
        .output()
        .ok()
        .and_then(|out| parse_sdk(&String::from_utf8_lossy(&out.stdout)))
        .unwrap_or(0)
}

fn parse_sdk(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}
