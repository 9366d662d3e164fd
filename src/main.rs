// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later
mod conf;
mod core;
mod daemon;
mod defs;
mod utils;

use anyhow::Result;
use clap::Parser;
use conf::{
    cli::{Cli, Commands},
    cli_handlers,
};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenConfig { output } = &cli.command {
        return cli_handlers::handle_gen_config(output);
    }

    let config = cli_handlers::load_config(&cli)?;

    match &cli.command {
        Commands::Daemon { late_props } => {
            let _log_guard = utils::init_logging(cli.verbose, Some(&config.log_file))?;
            log::info!(">> Initializing shroud daemon...");
            if let Err(e) = daemon::run(config, *late_props) {
                log::error!("Daemon exited: {:#}", e);
                return Err(e);
            }
            Ok(())
        }
        Commands::Enable { late_props } => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_enable(&config, *late_props)
        }
        Commands::Disable => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_disable(&config)
        }
        Commands::Add { owner, process } => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_add(&config, owner, process.as_deref())
        }
        Commands::Remove { owner, process } => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_remove(&config, owner, process.as_deref())
        }
        Commands::List => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_list(&config)
        }
        Commands::Status => {
            utils::init_client_logging(cli.verbose);
            cli_handlers::handle_status(&config)
        }
        Commands::ShowConfig => cli_handlers::handle_show_config(&config),
        Commands::GenConfig { .. } => Ok(()),
    }
}
