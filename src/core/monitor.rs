// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashSet,
    sync::{
        Weak,
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};
use procfs::process::all_processes_with_root;

use crate::core::controller::HideContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    /// Forget what was already reported and scan now.
    Refresh,
    Shutdown,
}

/// Control side of the monitoring worker.
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorSignal>,
    worker: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn(ctx: Weak<HideContext>, interval: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("proc_monitor".to_string())
            .spawn(move || run(ctx, rx, interval))
            .context("Failed to start process monitor")?;
        Ok(Self { tx, worker })
    }

    pub fn refresh(&self) {
        if self.tx.send(MonitorSignal::Refresh).is_err() {
            log::warn!("proc_monitor: worker already exited");
        }
    }

    /// Signals the worker to stop. The returned handle should be joined
    /// once no lock the worker might need is held.
    pub fn shutdown(self) -> JoinHandle<()> {
        let _ = self.tx.send(MonitorSignal::Shutdown);
        self.worker
    }
}

fn run(ctx: Weak<HideContext>, rx: mpsc::Receiver<MonitorSignal>, interval: Duration) {
    log::info!("proc_monitor: started");
    let mut seen = HashSet::new();

    loop {
        let Some(context) = ctx.upgrade() else {
            break;
        };
        if let Err(e) = scan(&context, &mut seen) {
            log::warn!("proc_monitor: scan failed: {}", e);
        }
        drop(context);

        match rx.recv_timeout(interval) {
            Ok(MonitorSignal::Refresh) => seen.clear(),
            Ok(MonitorSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    log::info!("proc_monitor: stopped");
}

/// One pass over the process table. Each target pid is reported once for as
/// long as it stays alive. Returns how many were reported.
pub fn scan(ctx: &HideContext, seen: &mut HashSet<i32>) -> procfs::ProcResult<usize> {
    let min_len = ctx.config().min_prefix_len;
    let observer = ctx.host().observer.clone();
    let mut alive = HashSet::new();
    let mut reported = 0;

    for proc in all_processes_with_root(&ctx.config().proc_dir)?.filter_map(Result::ok) {
        alive.insert(proc.pid);
        if seen.contains(&proc.pid) {
            continue;
        }

        let Ok(uid) = proc.uid() else {
            continue;
        };
        let Some(name) = proc.cmdline().ok().and_then(|args| args.into_iter().next()) else {
            continue;
        };

        if ctx.is_target(uid, &name, min_len) {
            seen.insert(proc.pid);
            observer.on_target(proc.pid, uid, &name);
            reported += 1;
        }
    }

    seen.retain(|pid| alive.contains(pid));
    Ok(reported)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::testing::Fixture;

    #[test]
    fn scan_reports_each_target_once() {
        let fx = Fixture::new();
        fx.ctx.enable(false).unwrap();
        fx.ctx.add("com.a", "com.a").unwrap();

        let mut seen = HashSet::new();
        assert_eq!(scan(&fx.ctx, &mut seen).unwrap(), 1);
        assert!(seen.contains(&105));
        assert_eq!(scan(&fx.ctx, &mut seen).unwrap(), 0);

        seen.clear();
        assert_eq!(scan(&fx.ctx, &mut seen).unwrap(), 1);
    }

    #[test]
    fn exited_pids_are_forgotten() {
        let fx = Fixture::new();
        fx.ctx.enable(false).unwrap();

        let mut seen = HashSet::from([4242]);
        assert_eq!(scan(&fx.ctx, &mut seen).unwrap(), 0);
        assert!(seen.is_empty());
    }

    #[test]
    fn worker_stops_on_shutdown() {
        let fx = Fixture::new();
        let handle =
            MonitorHandle::spawn(Arc::downgrade(&fx.ctx), Duration::from_secs(60)).unwrap();
        handle.refresh();
        handle.shutdown().join().unwrap();
    }
}
