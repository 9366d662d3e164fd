// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{os::unix::net::UnixStream, path::Path};

use anyhow::{Context, Result, bail};

use crate::{
    conf::{cli::Cli, config::HideConfig},
    daemon::protocol::{RequestCode, StatusCode, UnixStreamExt, read_record},
    defs,
};

pub fn load_config(cli: &Cli) -> Result<HideConfig> {
    if let Some(config_path) = &cli.config {
        return HideConfig::from_file(config_path)
            .map(HideConfig::resolve)
            .with_context(|| {
                format!(
                    "Failed to load config from custom path: {}",
                    config_path.display()
                )
            });
    }

    match HideConfig::load_default() {
        Ok(config) => Ok(config.resolve()),
        Err(e) => {
            let is_not_found = e
                .root_cause()
                .downcast_ref::<std::io::Error>()
                .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                .unwrap_or(false);

            if is_not_found {
                Ok(HideConfig::default().resolve())
            } else {
                Err(e).context(format!(
                    "Failed to load default config from {}",
                    defs::CONFIG_FILE
                ))
            }
        }
    }
}

pub fn handle_gen_config(output: &Path) -> Result<()> {
    HideConfig::default()
        .save_to_file(output)
        .with_context(|| format!("Failed to save generated config to {}", output.display()))?;
    println!("Config written to {}", output.display());
    Ok(())
}

pub fn handle_show_config(config: &HideConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}

fn connect(config: &HideConfig, request: RequestCode) -> Result<UnixStream> {
    let mut stream = UnixStream::connect(&config.socket_path).with_context(|| {
        format!(
            "Failed to connect to daemon at {}",
            config.socket_path.display()
        )
    })?;
    stream.write_i32(request as i32)?;
    Ok(stream)
}

fn expect_success(stream: &mut UnixStream) -> Result<()> {
    let status = stream.read_status()?;
    if status != StatusCode::Success {
        bail!("{}", status);
    }
    Ok(())
}

pub fn handle_enable(config: &HideConfig, late_props: bool) -> Result<()> {
    let mut stream = connect(config, RequestCode::Enable)?;
    stream.write_i32(i32::from(late_props))?;
    expect_success(&mut stream)
}

pub fn handle_disable(config: &HideConfig) -> Result<()> {
    let mut stream = connect(config, RequestCode::Disable)?;
    expect_success(&mut stream)
}

pub fn handle_add(config: &HideConfig, owner: &str, process: Option<&str>) -> Result<()> {
    let mut stream = connect(config, RequestCode::Add)?;
    stream.write_string(owner)?;
    stream.write_string(process.unwrap_or_default())?;
    expect_success(&mut stream)
}

pub fn handle_remove(config: &HideConfig, owner: &str, process: Option<&str>) -> Result<()> {
    let mut stream = connect(config, RequestCode::Remove)?;
    stream.write_string(owner)?;
    stream.write_string(process.unwrap_or_default())?;
    expect_success(&mut stream)
}

pub fn handle_list(config: &HideConfig) -> Result<()> {
    let mut stream = connect(config, RequestCode::List)?;
    expect_success(&mut stream)?;
    while let Some(record) = read_record(&mut stream)? {
        println!("{}", record);
    }
    Ok(())
}

pub fn handle_status(config: &HideConfig) -> Result<()> {
    let mut stream = connect(config, RequestCode::Status)?;
    expect_success(&mut stream)?;
    println!("{}", stream.read_string()?);
    Ok(())
}
