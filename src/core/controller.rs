// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    os::fd::RawFd,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use anyhow::Result;
use rustix::fs::{Access, access};
use serde::Serialize;

use crate::{
    conf::config::HideConfig,
    core::{
        entry::{HideEntry, Owner},
        error::{HideError, HideResult},
        host::HostServices,
        index::{self, IdentityIndex, UidLayout},
        monitor::MonitorHandle,
        registry::Registry,
        scanner::{MatchMode, ProcScanner},
        tasks::TaskRunner,
        watcher::PackageWatcher,
    },
    defs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HidePhase {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

struct HideState {
    phase: HidePhase,
    registry: Registry,
    index: IdentityIndex,
    /// Bumped on every registry change; a rebuild computed from an older
    /// snapshot is thrown away.
    generation: u64,
    scanner: ProcScanner,
    monitor: Option<MonitorHandle>,
    watch_fd: Option<RawFd>,
}

#[derive(Debug, Serialize)]
pub struct HideStatus {
    pub phase: HidePhase,
    pub injection: bool,
    pub entries: usize,
    pub indexed_ids: usize,
    pub manager_app_id: Option<i32>,
}

/// Owns the hide list, the identity index and the enabled state. All three
/// sit behind one lock.
pub struct HideContext {
    config: HideConfig,
    layout: UidLayout,
    host: HostServices,
    state: Mutex<HideState>,
    tasks: TaskRunner,
    weak_self: Weak<HideContext>,
}

impl HideContext {
    pub fn new(config: HideConfig, host: HostServices) -> Result<Arc<Self>> {
        let tasks = TaskRunner::new("hide_tasks")?;
        let layout = config.uid_layout();
        let scanner = ProcScanner::new(&config.proc_dir);

        Ok(Arc::new_cyclic(|weak| Self {
            config,
            layout,
            host,
            state: Mutex::new(HideState {
                phase: HidePhase::Disabled,
                registry: Registry::default(),
                index: IdentityIndex::default(),
                generation: 0,
                scanner,
                monitor: None,
                watch_fd: None,
            }),
            tasks,
            weak_self: weak.clone(),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, HideState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &HideConfig {
        &self.config
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    #[cfg(test)]
    pub fn phase(&self) -> HidePhase {
        self.lock().phase
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.phase() == HidePhase::Enabled
    }

    pub fn status(&self) -> HideStatus {
        let manager_app_id = self.host.manager.resolve(|| {
            index::package_app_id(
                &self.config.app_data_dir,
                &self.config.manager_package,
                self.layout,
            )
        });

        let state = self.lock();
        HideStatus {
            phase: state.phase,
            injection: self.config.injection,
            entries: state.registry.len(),
            indexed_ids: state.index.len(),
            manager_app_id,
        }
    }

    pub fn enable(&self, late_props: bool) -> HideResult<()> {
        let mut state = self.lock();

        if state.phase == HidePhase::Enabled {
            return Err(HideError::AlreadyEnabled);
        }

        if access(&self.config.mnt_ns_path, Access::EXISTS).is_err() {
            return Err(HideError::NoNamespace);
        }

        state.scanner.open().map_err(HideError::ProcTable)?;

        log::info!("* Enable process hiding");
        state.phase = HidePhase::Enabling;

        if let Err(e) = self.bootstrap(&mut state, late_props) {
            log::error!("hide: enable failed: {}", e);
            state.registry.clear();
            state.generation += 1;
            state.phase = HidePhase::Disabled;
            return Err(e);
        }

        state.phase = HidePhase::Enabled;
        self.persist_flag(true);
        drop(state);

        // Rebuilt on the task runner, outside the lock.
        self.schedule_rebuild();
        Ok(())
    }

    fn bootstrap(&self, state: &mut HideState, late_props: bool) -> HideResult<()> {
        self.init_list(state)?;

        if self.config.injection {
            self.host.props.hide_sensitive();
            if late_props {
                self.host.props.hide_late_sensitive();
            }
        }

        let monitor = MonitorHandle::spawn(self.weak_self.clone(), self.config.monitor_interval())?;
        state.monitor = Some(monitor);

        if self.config.injection {
            state.watch_fd = self.watch_packages();
        }
        Ok(())
    }

    fn init_list(&self, state: &mut HideState) -> HideResult<()> {
        log::debug!("hide: initialize");

        let rows = self
            .host
            .store
            .load_entries()
            .map_err(HideError::Persistence)?;
        for (owner, process) in rows {
            match HideEntry::new(&owner, &process) {
                Ok(entry) => self.insert_target(state, entry),
                Err(e) => log::warn!("hide: skipping stored row: {}", e),
            }
        }

        // Kill pooled and per-app zygotes so they re-fork after the list is set.
        if self.config.sdk_int >= defs::USAP_MIN_SDK && self.config.injection {
            let terminator = self.host.terminator.as_ref();
            for pool in defs::USAP_POOLS {
                if let Err(e) = state.scanner.kill(pool, true, MatchMode::Exact, terminator) {
                    log::warn!("hide: failed to scan for {}: {}", pool, e);
                }
            }
            if let Err(e) = state.scanner.kill(
                defs::APP_ZYGOTE_SUFFIX,
                true,
                MatchMode::Suffix,
                terminator,
            ) {
                log::warn!("hide: failed to scan for app zygotes: {}", e);
            }
        }

        self.insert_target(state, default_entry(defs::SNET_PROC));

        // A non-default staging dir also hides the main GMS process.
        if !self.config.staging_is_default() {
            self.insert_target(state, default_entry(defs::GMS_PKG));
        }
        Ok(())
    }

    fn watch_packages(&self) -> Option<RawFd> {
        let watcher = match PackageWatcher::new(
            &self.config.system_dir,
            &self.config.packages_file,
            self.weak_self.clone(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                log::warn!(
                    "hide: cannot watch {}: {}",
                    self.config.system_dir.display(),
                    e
                );
                return None;
            }
        };

        match self.host.poller.register(Box::new(watcher)) {
            Ok(fd) => Some(fd),
            Err(e) => {
                log::warn!("hide: failed to register package watcher: {:#}", e);
                None
            }
        }
    }

    fn insert_target(&self, state: &mut HideState, entry: HideEntry) {
        let (mode, multi) = match entry.owner {
            // Isolated names carry a random suffix.
            Owner::IsolatedClass => (MatchMode::Prefix, true),
            Owner::Package(_) => (MatchMode::Exact, false),
        };
        let process = entry.process.clone();

        if state.registry.insert(entry) {
            state.generation += 1;
        }

        if !self.config.injection {
            return;
        }
        let terminator = self.host.terminator.as_ref();
        if let Err(e) = state.scanner.kill(&process, multi, mode, terminator) {
            log::warn!("hide: failed to scan for {}: {}", process, e);
        }
    }

    fn persist_flag(&self, enabled: bool) {
        if let Err(e) = self.host.store.set_hide_enabled(enabled) {
            log::error!("hide: failed to save hide state: {:#}", e);
        }
    }

    pub fn disable(&self) {
        let mut state = self.lock();
        let mut worker = None;

        if state.phase == HidePhase::Enabled {
            log::info!("* Disable process hiding");
            state.phase = HidePhase::Disabling;
            state.index.clear();
            state.registry.clear();
            state.generation += 1;
            worker = state.monitor.take().map(MonitorHandle::shutdown);
            if let Some(fd) = state.watch_fd.take() {
                self.host.poller.unregister(fd);
            }
        }

        state.phase = HidePhase::Disabled;
        self.persist_flag(false);
        drop(state);

        // The worker takes the lock while scanning.
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            log::warn!("proc_monitor: worker panicked");
        }
    }

    /// Startup path: refreshes a running instance, or restores the persisted
    /// enabled state.
    pub fn auto_start(&self, late_props: bool) {
        {
            let state = self.lock();
            if state.phase == HidePhase::Enabled {
                if let Some(monitor) = &state.monitor {
                    monitor.refresh();
                }
                drop(state);
                if self.config.injection {
                    self.host.props.hide_late_sensitive();
                }
                return;
            }
        }

        match self.host.store.hide_enabled() {
            Ok(true) => {
                if let Err(e) = self.enable(late_props) {
                    log::error!("hide: auto start failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => log::error!("hide: failed to read hide state: {:#}", e),
        }
    }

    pub fn add(&self, owner: &str, process: &str) -> HideResult<()> {
        {
            let mut state = self.lock();
            if state.phase != HidePhase::Enabled {
                return Err(HideError::NotEnabled);
            }

            let entry = HideEntry::new(owner, process)?;
            if state.registry.contains(&entry) {
                return Err(HideError::AlreadyExists);
            }

            self.host
                .store
                .insert_entry(entry.owner.as_str(), &entry.process)
                .map_err(HideError::Persistence)?;
            self.insert_target(&mut state, entry);
        }

        self.rebuild_index();
        Ok(())
    }

    /// An empty `process` removes every entry of `owner`.
    pub fn remove(&self, owner: &str, process: &str) -> HideResult<()> {
        let owner = Owner::parse(owner);
        let process = (!process.is_empty()).then_some(process);

        {
            let mut state = self.lock();
            if state.phase != HidePhase::Enabled {
                return Err(HideError::NotEnabled);
            }
            if state.registry.remove(&owner, process).is_empty() {
                return Err(HideError::NotFound);
            }
            state.generation += 1;
        }

        // A failed delete keeps the in-memory removal.
        if let Err(e) = self.host.store.delete_entries(owner.as_str(), process) {
            log::error!("hide: failed to delete stored rows: {:#}", e);
        }

        self.rebuild_index();
        Ok(())
    }

    pub fn list(&self) -> HideResult<Vec<HideEntry>> {
        let state = self.lock();
        if state.phase != HidePhase::Enabled {
            return Err(HideError::NotEnabled);
        }
        Ok(state.registry.snapshot())
    }

    pub fn is_target(&self, uid: u32, process: &str, min_len: usize) -> bool {
        self.lock()
            .index
            .is_target(self.layout, uid, process, min_len)
    }

    /// Recomputes the identity index. The directory traversal runs without
    /// the lock held.
    pub fn rebuild_index(&self) {
        if !self.config.injection {
            return;
        }

        let Some((entries, generation)) = self.index_snapshot() else {
            return;
        };
        let index = IdentityIndex::build_from_fs(&entries, &self.config.app_data_dir, self.layout);
        self.store_index(index, generation);
    }

    /// Registry contents and generation to rebuild from, `None` unless enabled.
    fn index_snapshot(&self) -> Option<(Vec<HideEntry>, u64)> {
        let state = self.lock();
        (state.phase == HidePhase::Enabled).then(|| (state.registry.snapshot(), state.generation))
    }

    /// Installs `index` if the registry is still at `generation`. Returns
    /// whether it was installed.
    fn store_index(&self, index: IdentityIndex, generation: u64) -> bool {
        let mut state = self.lock();
        if state.phase == HidePhase::Enabled && state.generation == generation {
            log::debug!("hide: index rebuilt, {} ids", index.len());
            state.index = index;
            true
        } else {
            log::debug!("hide: discarding stale index rebuild");
            false
        }
    }

    pub fn schedule_rebuild(&self) {
        let ctx = self.weak_self.clone();
        self.tasks.spawn(move || {
            if let Some(ctx) = ctx.upgrade() {
                ctx.rebuild_index();
            }
        });
    }

    /// Blocks until queued background work has finished.
    #[cfg(test)]
    pub fn wait_tasks(&self) {
        self.tasks.wait_idle();
    }
}

impl Drop for HideContext {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(fd) = state.watch_fd.take() {
            self.host.poller.unregister(fd);
        }
        if let Some(monitor) = state.monitor.take() {
            drop(monitor.shutdown());
        }
    }
}

fn default_entry(process: &str) -> HideEntry {
    HideEntry {
        owner: Owner::Package(defs::GMS_PKG.to_string()),
        process: process.to_string(),
    }
}
