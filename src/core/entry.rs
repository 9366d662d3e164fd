// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fmt, sync::OnceLock};

use regex_lite::Regex;

use crate::{
    core::error::{HideError, HideResult},
    defs,
};

static PACKAGE_REGEX: OnceLock<Regex> = OnceLock::new();
static PROCESS_REGEX: OnceLock<Regex> = OnceLock::new();
static ISOLATED_PROCESS_REGEX: OnceLock<Regex> = OnceLock::new();

/// The application a hidden process belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner {
    Package(String),
    /// Isolated processes are not tied to one package; they carry a random
    /// numeric suffix on a shared base name.
    IsolatedClass,
}

impl Owner {
    pub fn parse(raw: &str) -> Self {
        if raw == defs::ISOLATED_MAGIC {
            Self::IsolatedClass
        } else {
            Self::Package(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Package(name) => name,
            Self::IsolatedClass => defs::ISOLATED_MAGIC,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HideEntry {
    pub owner: Owner,
    pub process: String,
}

impl HideEntry {
    /// Builds a validated entry. An empty process name stands for the
    /// owner's default process.
    pub fn new(owner: &str, process: &str) -> HideResult<Self> {
        let process = if process.is_empty() { owner } else { process };
        let entry = Self {
            owner: Owner::parse(owner),
            process: process.to_string(),
        };
        if entry.is_valid() {
            Ok(entry)
        } else {
            Err(HideError::Invalid {
                owner: owner.to_string(),
                process: process.to_string(),
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        match &self.owner {
            Owner::IsolatedClass => isolated_process_regex().is_match(&self.process),
            Owner::Package(pkg) => {
                package_regex().is_match(pkg) && process_regex().is_match(&self.process)
            }
        }
    }
}

impl fmt::Display for HideEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.owner, self.process)
    }
}

fn package_regex() -> &'static Regex {
    PACKAGE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.]*\.[A-Za-z0-9_.]*$").expect("Invalid package regex")
    })
}

fn process_regex() -> &'static Regex {
    PROCESS_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:]*$").expect("Invalid process regex"))
}

fn isolated_process_regex() -> &'static Regex {
    ISOLATED_PROCESS_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]*(:.*)?$").expect("Invalid isolated regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_packages_and_sub_processes() {
        assert!(HideEntry::new("com.example.app", "com.example.app").is_ok());
        assert!(HideEntry::new("com.example.app", "com.example.app:remote").is_ok());
        assert!(HideEntry::new("com.example_1.app", "").is_ok());
    }

    #[test]
    fn package_needs_a_dot() {
        assert!(matches!(
            HideEntry::new("badname", "badname"),
            Err(HideError::Invalid { .. })
        ));
        assert!(HideEntry::new("", "proc").is_err());
        assert!(HideEntry::new("com.example-app", "proc").is_err());
    }

    #[test]
    fn process_charset_is_checked() {
        assert!(HideEntry::new("com.example.app", "com.example app").is_err());
        assert!(HideEntry::new("com.example.app", "proc/1").is_err());
    }

    #[test]
    fn isolated_grammar() {
        let entry = HideEntry::new(defs::ISOLATED_MAGIC, "proc:123").unwrap();
        assert_eq!(entry.owner, Owner::IsolatedClass);
        assert!(HideEntry::new(defs::ISOLATED_MAGIC, "proc_abc.x").is_ok());
        // Anything may follow the colon.
        assert!(HideEntry::new(defs::ISOLATED_MAGIC, "proc:1!2").is_ok());
        assert!(HideEntry::new(defs::ISOLATED_MAGIC, "proc!123").is_err());
    }

    #[test]
    fn empty_process_defaults_to_owner() {
        let entry = HideEntry::new("com.example.app", "").unwrap();
        assert_eq!(entry.process, "com.example.app");
        assert_eq!(entry.to_string(), "com.example.app|com.example.app");
    }

    #[test]
    fn isolated_sorts_after_packages() {
        let pkg = Owner::parse("zz.last");
        assert!(pkg < Owner::IsolatedClass);
        assert_eq!(Owner::IsolatedClass.as_str(), defs::ISOLATED_MAGIC);
    }
}
