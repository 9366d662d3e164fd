// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashMap,
    fs,
    os::{
        fd::{AsFd, AsRawFd, RawFd},
        unix::fs::MetadataExt,
    },
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::{Result, bail};
use tempfile::{TempDir, tempdir};

pub(crate) use crate::core::scanner::tests::{Recorder, fake_proc};
use crate::{
    conf::config::HideConfig,
    core::{
        HideContext,
        host::{HostServices, ManagerCache, PollSource, Poller, PropertyHider, TargetObserver},
        store::{HideStore, JsonStore},
    },
};

pub(crate) const MANAGER_APP_ID: i32 = 10123;

pub(crate) const PROCS: &[(i32, &str)] = &[
    (100, "usap64"),
    (101, "usap32"),
    (102, "com.a_zygote"),
    (103, "webview_zygote"),
    (104, "com.google.android.gms.unstable"),
    (105, "com.a"),
    (106, "com.b"),
];

#[derive(Default)]
pub(crate) struct FakePoller {
    sources: Mutex<HashMap<RawFd, Box<dyn PollSource>>>,
}

impl FakePoller {
    pub(crate) fn registered(&self) -> usize {
        self.sources.lock().unwrap().len()
    }
}

impl Poller for FakePoller {
    fn register(&self, source: Box<dyn PollSource>) -> Result<RawFd> {
        let fd = source.as_fd().as_raw_fd();
        self.sources.lock().unwrap().insert(fd, source);
        Ok(fd)
    }

    fn unregister(&self, fd: RawFd) {
        self.sources.lock().unwrap().remove(&fd);
    }
}

/// `JsonStore` whose row writes can be made to fail.
pub(crate) struct FlakyStore {
    inner: JsonStore,
    fail_rows: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn fail_row_writes(&self, fail: bool) {
        self.fail_rows.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_rows.load(Ordering::SeqCst) {
            bail!("store is read-only");
        }
        Ok(())
    }
}

impl HideStore for FlakyStore {
    fn load_entries(&self) -> Result<Vec<(String, String)>> {
        self.inner.load_entries()
    }

    fn insert_entry(&self, owner: &str, process: &str) -> Result<()> {
        self.check()?;
        self.inner.insert_entry(owner, process)
    }

    fn delete_entries(&self, owner: &str, process: Option<&str>) -> Result<()> {
        self.check()?;
        self.inner.delete_entries(owner, process)
    }

    fn hide_enabled(&self) -> Result<bool> {
        self.inner.hide_enabled()
    }

    fn set_hide_enabled(&self, enabled: bool) -> Result<()> {
        self.inner.set_hide_enabled(enabled)
    }
}

#[derive(Default)]
pub(crate) struct PropsRecorder {
    pub(crate) normal: AtomicUsize,
    pub(crate) late: AtomicUsize,
}

impl PropsRecorder {
    pub(crate) fn counts(&self) -> (usize, usize) {
        (
            self.normal.load(Ordering::SeqCst),
            self.late.load(Ordering::SeqCst),
        )
    }
}

impl PropertyHider for PropsRecorder {
    fn hide_sensitive(&self) {
        self.normal.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_late_sensitive(&self) {
        self.late.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct Observed(pub(crate) Mutex<Vec<(i32, u32, String)>>);

impl TargetObserver for Observed {
    fn on_target(&self, pid: i32, uid: u32, process: &str) {
        self.0.lock().unwrap().push((pid, uid, process.to_string()));
    }
}

/// A context wired to temp directories and recording collaborators.
pub(crate) struct Fixture {
    pub(crate) ctx: Arc<HideContext>,
    pub(crate) store: Arc<FlakyStore>,
    pub(crate) killed: Arc<Recorder>,
    pub(crate) props: Arc<PropsRecorder>,
    pub(crate) poller: Arc<FakePoller>,
    pub(crate) manager: Arc<ManagerCache>,
    pub(crate) proc: TempDir,
    pub(crate) root: TempDir,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::build(|_| {})
    }

    pub(crate) fn build<F>(configure: F) -> Self
    where
        F: FnOnce(&mut HideConfig),
    {
        let proc = fake_proc(PROCS);
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("user_de/0/com.a")).unwrap();
        fs::create_dir_all(root.path().join("system")).unwrap();

        let mut config = HideConfig {
            proc_dir: proc.path().to_path_buf(),
            mnt_ns_path: proc.path().join("self/ns/mnt"),
            app_data_dir: root.path().join("user_de"),
            system_dir: root.path().join("system"),
            store_file: root.path().join("hidelist.json"),
            socket_path: root.path().join("shroud.sock"),
            log_file: root.path().join("daemon.log"),
            sdk_int: 30,
            monitor_interval_ms: 60_000,
            ..HideConfig::default()
        };
        configure(&mut config);

        let store = Arc::new(FlakyStore {
            inner: JsonStore::new(&config.store_file),
            fail_rows: AtomicBool::new(false),
        });
        let killed = Arc::new(Recorder::default());
        let props = Arc::new(PropsRecorder::default());
        let poller = Arc::new(FakePoller::default());
        let manager = Arc::new(ManagerCache::from(MANAGER_APP_ID));

        let host = HostServices {
            store: store.clone(),
            poller: poller.clone(),
            props: props.clone(),
            terminator: killed.clone(),
            observer: Arc::new(Observed::default()),
            manager: manager.clone(),
        };
        let ctx = HideContext::new(config, host).unwrap();

        Self {
            ctx,
            store,
            killed,
            props,
            poller,
            manager,
            proc,
            root,
        }
    }

    /// Uid owning the `com.a` data directory, which is also the uid of every
    /// fake process.
    pub(crate) fn app_uid(&self) -> u32 {
        fs::metadata(self.root.path().join("user_de/0/com.a"))
            .unwrap()
            .uid()
    }

    pub(crate) fn system_dir(&self) -> PathBuf {
        self.root.path().join("system")
    }

    pub(crate) fn listed(&self) -> Vec<String> {
        self.ctx
            .list()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}
