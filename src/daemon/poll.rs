// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashMap,
    fs::File,
    io::{ErrorKind, Read, Write},
    os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use nix::{
    errno::Errno,
    fcntl::OFlag,
    poll::{PollFd, PollFlags, PollTimeout, poll},
    unistd::pipe2,
};

use crate::core::host::{PollSource, Poller};

#[derive(Default)]
struct Sources {
    active: HashMap<RawFd, Box<dyn PollSource>>,
    /// Unregistered sources; only the loop thread drops them, so nothing is
    /// closed while it sits in `poll`.
    retired: Vec<Box<dyn PollSource>>,
    /// Sources that reported an error or hangup with nothing to read. They
    /// are no longer polled but stay open until unregistered.
    faulted: HashMap<RawFd, Box<dyn PollSource>>,
}

struct Shared {
    sources: Mutex<Sources>,
    wake_rx: File,
    wake_tx: File,
    stop: AtomicBool,
}

impl Shared {
    fn sources(&self) -> MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wake(&self) {
        if let Err(e) = (&self.wake_tx).write_all(&[1])
            && e.kind() != ErrorKind::WouldBlock
        {
            log::warn!("poll: failed to wake event loop: {}", e);
        }
    }

    fn drain_wake(&self) {
        let mut buf = [0u8; 64];
        while let Ok(n) = (&self.wake_rx).read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }
}

/// Poll dispatcher thread. Handlers run on this thread and must not block
/// or register/unregister sources themselves.
pub struct EventLoop {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    pub fn start() -> Result<Arc<Self>> {
        let (rx, tx) =
            pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK).context("Failed to create wake pipe")?;
        let shared = Arc::new(Shared {
            sources: Mutex::new(Sources::default()),
            wake_rx: File::from(rx),
            wake_tx: File::from(tx),
            stop: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("poll_loop".to_string())
            .spawn(move || run(&worker_shared))
            .context("Failed to start event loop")?;

        Ok(Arc::new(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }))
    }
}

impl Poller for EventLoop {
    fn register(&self, source: Box<dyn PollSource>) -> Result<RawFd> {
        let fd = source.as_fd().as_raw_fd();
        self.shared.sources().active.insert(fd, source);
        self.shared.wake();
        Ok(fd)
    }

    fn unregister(&self, fd: RawFd) {
        let mut sources = self.shared.sources();
        if let Some(source) = sources
            .active
            .remove(&fd)
            .or_else(|| sources.faulted.remove(&fd))
        {
            sources.retired.push(source);
        }
        drop(sources);
        self.shared.wake();
    }
}

#[cfg(test)]
impl EventLoop {
    fn faulted(&self) -> usize {
        self.shared.sources().faulted.len()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake();
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

fn run(shared: &Shared) {
    while !shared.stop.load(Ordering::Acquire) {
        let fds: Vec<RawFd> = {
            let mut sources = shared.sources();
            sources.retired.clear();
            sources.active.keys().copied().collect()
        };

        let mut pollfds = Vec::with_capacity(fds.len() + 1);
        pollfds.push(PollFd::new(shared.wake_rx.as_fd(), PollFlags::POLLIN));
        for fd in &fds {
            // SAFETY: registered descriptors are only closed by this thread,
            // at the top of the loop, never while they are being polled.
            let fd = unsafe { BorrowedFd::borrow_raw(*fd) };
            pollfds.push(PollFd::new(fd, PollFlags::POLLIN));
        }

        match poll(&mut pollfds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => {
                log::error!("poll: {}", e);
                break;
            }
        }

        if pollfds[0]
            .revents()
            .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
        {
            shared.drain_wake();
        }
        let ready: Vec<(RawFd, PollFlags)> = pollfds[1..]
            .iter()
            .zip(&fds)
            .filter_map(|(p, fd)| p.revents().filter(|r| !r.is_empty()).map(|r| (*fd, r)))
            .collect();
        drop(pollfds);

        let mut sources = shared.sources();
        for (fd, revents) in ready {
            if revents.contains(PollFlags::POLLIN) {
                if let Some(source) = sources.active.get_mut(&fd) {
                    source.on_ready();
                }
            } else if let Some(source) = sources.active.remove(&fd) {
                // POLLERR, POLLHUP or POLLNVAL alone would wake poll forever.
                log::warn!("poll: fd {} reported {:?}, no longer polled", fd, revents);
                sources.faulted.insert(fd, source);
            }
        }
    }
    log::debug!("poll: event loop stopped");
}
