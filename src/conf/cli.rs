// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::defs;

#[derive(Parser, Debug)]
#[command(name = "shroud", version, about = "Process hide list daemon")]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon in the foreground
    Daemon {
        /// Also rewrite properties that are only safe after boot completes
        #[arg(long = "late-props")]
        late_props: bool,
    },
    Enable {
        #[arg(long = "late-props")]
        late_props: bool,
    },
    Disable,
    /// Add a package (or "isolated") and optional process to the hide list
    Add {
        owner: String,
        process: Option<String>,
    },
    /// Remove one process, or every process of the owner when omitted
    #[command(name = "rm")]
    Remove {
        owner: String,
        process: Option<String>,
    },
    #[command(name = "ls")]
    List,
    Status,
    GenConfig {
        #[arg(short = 'o', long = "output", default_value = defs::CONFIG_FILE)]
        output: PathBuf,
    },
    ShowConfig,
}
