// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    sync::{Mutex, mpsc},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single worker thread running jobs in submission order, so slow work
/// (index rebuilds) never runs on the thread that requested it.
pub struct TaskRunner {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRunner {
    pub fn new(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in rx {
                    job();
                }
                log::debug!("task runner exiting");
            })
            .context("Failed to spawn task runner")?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match tx.as_ref() {
            Some(tx) if tx.send(Box::new(job)).is_ok() => {}
            _ => log::warn!("task runner is gone, job dropped"),
        }
    }

    /// Blocks until every job submitted before this call has run.
    #[cfg(test)]
    pub fn wait_idle(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.spawn(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv();
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker
            && worker.thread().id() != thread::current().id()
        {
            let _ = worker.join();
        }
    }
}
