// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    os::fd::{AsFd, RawFd},
    sync::{
        Arc,
        atomic::{AtomicI32, Ordering},
    },
};

use anyhow::Result;
use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};

use crate::core::store::HideStore;

/// A readable descriptor plus what to do when it becomes ready.
pub trait PollSource: AsFd + Send {
    fn on_ready(&mut self);
}

/// Event-loop registration. Unregistering drops the source, which closes
/// its descriptor.
pub trait Poller: Send + Sync {
    fn register(&self, source: Box<dyn PollSource>) -> Result<RawFd>;
    fn unregister(&self, fd: RawFd);
}

pub trait PropertyHider: Send + Sync {
    fn hide_sensitive(&self);
    fn hide_late_sensitive(&self);
}

pub trait Terminator: Send + Sync {
    fn terminate(&self, pid: i32) -> Result<()>;
}

/// Receives processes the monitor found to be hide targets.
pub trait TargetObserver: Send + Sync {
    fn on_target(&self, pid: i32, uid: u32, process: &str);
}

pub struct SigKill;

impl Terminator for SigKill {
    fn terminate(&self, pid: i32) -> Result<()> {
        kill(Pid::from_raw(pid), Signal::SIGKILL)?;
        Ok(())
    }
}

pub struct LogObserver;

impl TargetObserver for LogObserver {
    fn on_target(&self, pid: i32, uid: u32, process: &str) {
        log::info!("proc_monitor: target PID=[{}] UID=[{}] ({})", pid, uid, process);
    }
}

/// App id of the root manager app. Filled on first lookup and cleared
/// when the package list is rewritten, since reinstalls reassign it.
#[derive(Debug)]
pub struct ManagerCache(AtomicI32);

impl Default for ManagerCache {
    fn default() -> Self {
        Self(AtomicI32::new(-1))
    }
}

impl From<i32> for ManagerCache {
    fn from(app_id: i32) -> Self {
        Self(AtomicI32::new(app_id))
    }
}

impl ManagerCache {
    pub fn get(&self) -> Option<i32> {
        let id = self.0.load(Ordering::Acquire);
        (id >= 0).then_some(id)
    }

    /// Cached id, or the result of `lookup` stored for later calls.
    pub fn resolve<F>(&self, lookup: F) -> Option<i32>
    where
        F: FnOnce() -> Option<u32>,
    {
        if let Some(id) = self.get() {
            return Some(id);
        }
        let id = lookup().and_then(|id| i32::try_from(id).ok())?;
        self.0.store(id, Ordering::Release);
        Some(id)
    }

    pub fn invalidate(&self) {
        self.0.store(-1, Ordering::Release);
    }
}

/// Everything the hide core talks to outside itself.
#[derive(Clone)]
pub struct HostServices {
    pub store: Arc<dyn HideStore>,
    pub poller: Arc<dyn Poller>,
    pub props: Arc<dyn PropertyHider>,
    pub terminator: Arc<dyn Terminator>,
    pub observer: Arc<dyn TargetObserver>,
    pub manager: Arc<ManagerCache>,
}
