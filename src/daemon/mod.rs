// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod poll;
pub mod props;
pub mod protocol;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    conf::config::HideConfig,
    core::{
        HideContext,
        host::{HostServices, LogObserver, ManagerCache, SigKill},
        store::JsonStore,
    },
};

/// Brings the hide core up and serves client requests until the socket
/// goes away.
pub fn run(config: HideConfig, late_props: bool) -> Result<()> {
    let event_loop = poll::EventLoop::start()?;
    let host = HostServices {
        store: Arc::new(JsonStore::new(&config.store_file)),
        poller: event_loop,
        props: Arc::new(props::ResetProp::new("resetprop")),
        terminator: Arc::new(SigKill),
        observer: Arc::new(LogObserver),
        manager: Arc::new(ManagerCache::default()),
    };

    log::info!(
        ">> Hide daemon starting (sdk {}, injection {})",
        config.sdk_int,
        config.injection
    );

    let socket_path = config.socket_path.clone();
    let ctx = HideContext::new(config, host).context("Failed to create hide context")?;
    ctx.auto_start(late_props);

    let listener = server::bind(&socket_path)?;
    log::info!(">> Listening on {}", socket_path.display());
    server::serve(listener, ctx)
}
