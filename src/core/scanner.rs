// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    path::{Path, PathBuf},
};

use nix::{dir::Dir, fcntl::OFlag, sys::stat::Mode};

use crate::{core::host::Terminator, defs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Prefix,
    /// Never matches the webview zygote, which must stay alive.
    Suffix,
}

impl MatchMode {
    pub fn matches(self, cmdline: &str, name: &str) -> bool {
        match self {
            Self::Exact => cmdline == name,
            Self::Prefix => cmdline.starts_with(name),
            Self::Suffix => cmdline != defs::WEBVIEW_ZYGOTE && cmdline.ends_with(name),
        }
    }
}

/// Walks the process table. The directory handle stays open between passes
/// since the monitor path scans repeatedly; a pass is not reentrant.
pub struct ProcScanner {
    root: PathBuf,
    dir: Option<Dir>,
}

impl ProcScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir: None,
        }
    }

    pub fn open(&mut self) -> nix::Result<&mut Dir> {
        if self.dir.is_none() {
            let dir = Dir::open(
                self.root.as_path(),
                OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
                Mode::empty(),
            )?;
            self.dir = Some(dir);
        }
        match self.dir.as_mut() {
            Some(dir) => Ok(dir),
            None => Err(nix::Error::EBADF),
        }
    }

    /// Calls `visit` for each pid until it returns false.
    pub fn for_each_pid<F>(&mut self, mut visit: F) -> nix::Result<()>
    where
        F: FnMut(i32) -> bool,
    {
        let dir = self.open()?;
        // Dropping the iterator rewinds the stream for the next pass.
        for entry in dir.iter().filter_map(Result::ok) {
            let pid = entry
                .file_name()
                .to_str()
                .ok()
                .and_then(|s| s.parse::<i32>().ok())
                .unwrap_or(0);
            if pid > 0 && !visit(pid) {
                break;
            }
        }
        Ok(())
    }

    pub fn matches(&self, pid: i32, name: &str, mode: MatchMode) -> bool {
        read_cmdline(&self.root, pid).is_some_and(|cmdline| mode.matches(&cmdline, name))
    }

    /// Terminates processes whose name matches. Stops after the first hit
    /// unless `multi` is set. Returns how many were signalled.
    pub fn kill(
        &mut self,
        name: &str,
        multi: bool,
        mode: MatchMode,
        terminator: &dyn Terminator,
    ) -> nix::Result<usize> {
        let mut pids = Vec::new();
        self.for_each_pid(|pid| {
            pids.push(pid);
            true
        })?;

        let mut killed = 0;
        for pid in pids {
            if !self.matches(pid, name, mode) {
                continue;
            }

            log::debug!("hide: kill PID=[{}] ({})", pid, name);
            match terminator.terminate(pid) {
                Ok(()) => killed += 1,
                Err(e) => log::warn!("hide: failed to kill PID=[{}]: {:#}", pid, e),
            }
            if !multi {
                break;
            }
        }

        Ok(killed)
    }
}

/// First argument of the process command line.
fn read_cmdline(root: &Path, pid: i32) -> Option<String> {
    let raw = fs::read(root.join(pid.to_string()).join("cmdline")).ok()?;
    let end = raw
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}
