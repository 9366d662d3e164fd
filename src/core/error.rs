// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

use crate::daemon::protocol::StatusCode;

#[derive(Debug, Error)]
pub enum HideError {
    #[error("invalid hide target: [{owner}/{process}]")]
    Invalid { owner: String, process: String },
    #[error("hide target already exists")]
    AlreadyExists,
    #[error("hide target not found")]
    NotFound,
    #[error("failed to persist hide list: {0:#}")]
    Persistence(anyhow::Error),
    #[error("mount namespace is not supported")]
    NoNamespace,
    #[error("cannot open process table: {0}")]
    ProcTable(#[source] nix::Error),
    #[error("hiding is already enabled")]
    AlreadyEnabled,
    #[error("hiding is not enabled")]
    NotEnabled,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HideError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid { .. } => StatusCode::InvalidName,
            Self::AlreadyExists => StatusCode::AlreadyExists,
            Self::NotFound => StatusCode::NotFound,
            Self::NoNamespace => StatusCode::NoNamespace,
            Self::AlreadyEnabled => StatusCode::AlreadyEnabled,
            Self::NotEnabled => StatusCode::NotEnabled,
            Self::Persistence(_) | Self::ProcTable(_) | Self::Internal(_) => {
                StatusCode::DaemonError
            }
        }
    }
}

pub type HideResult<T> = std::result::Result<T, HideError>;
