// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    ffi::{OsStr, OsString},
    os::fd::{AsFd, BorrowedFd},
    path::Path,
    sync::Weak,
};

use nix::{
    errno::Errno,
    sys::inotify::{AddWatchFlags, InitFlags, Inotify},
};

use crate::core::{controller::HideContext, host::PollSource};

/// Watches the package registry directory and rebuilds the identity index
/// when the package list is rewritten.
pub struct PackageWatcher {
    inotify: Inotify,
    packages_file: OsString,
    ctx: Weak<HideContext>,
}

impl PackageWatcher {
    pub fn new(dir: &Path, packages_file: &str, ctx: Weak<HideContext>) -> nix::Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)?;
        inotify.add_watch(dir, AddWatchFlags::IN_CLOSE_WRITE)?;
        log::debug!("hide: watching {}", dir.display());

        Ok(Self {
            inotify,
            packages_file: OsString::from(packages_file),
            ctx,
        })
    }

    /// Returns true if the event was for the package list.
    pub fn handle_event(&self, name: Option<&OsStr>) -> bool {
        if name != Some(self.packages_file.as_os_str()) {
            return false;
        }

        if let Some(ctx) = self.ctx.upgrade() {
            log::debug!("hide: {:?} changed", self.packages_file);
            ctx.host().manager.invalidate();
            ctx.schedule_rebuild();
        }
        true
    }
}

impl AsFd for PackageWatcher {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

impl PollSource for PackageWatcher {
    fn on_ready(&mut self) {
        loop {
            match self.inotify.read_events() {
                Ok(events) if events.is_empty() => break,
                Ok(events) => {
                    // One rebuild covers a burst of writes.
                    for event in &events {
                        if self.handle_event(event.name.as_deref()) {
                            break;
                        }
                    }
                }
                Err(Errno::EAGAIN) => break,
                Err(e) => {
                    log::warn!("hide: inotify read failed: {}", e);
                    break;
                }
            }
        }
    }
}
