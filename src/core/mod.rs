// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod controller;
pub mod entry;
pub mod error;
pub mod host;
pub mod index;
pub mod monitor;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod tasks;
pub mod watcher;

pub use controller::HideContext;

#[cfg(test)]
pub(crate) mod testing;
