// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    os::unix::{
        fs::PermissionsExt,
        net::{UnixListener, UnixStream},
    },
    path::Path,
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};

use crate::{
    core::{HideContext, error::HideResult},
    daemon::protocol::{RequestCode, StatusCode, UnixStreamExt, write_record},
    utils,
};

pub fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        utils::ensure_dir_exists(parent)?;
    }
    let _ = fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind socket {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

pub fn serve(listener: UnixListener, ctx: Arc<HideContext>) -> Result<()> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            if let Err(e) = handle_connection(stream, &ctx) {
                log::warn!("Error handling request: {:#}", e);
            }
        });
    }
    Ok(())
}

pub fn handle_connection(mut stream: UnixStream, ctx: &HideContext) -> Result<()> {
    let code = stream.read_i32()?;
    let request = RequestCode::try_from(code)?;
    log::debug!("New request: {:?}", request);

    match request {
        RequestCode::Enable => {
            let late_props = stream.read_i32()? != 0;
            stream.write_status(status_of(ctx.enable(late_props)))?;
        }
        RequestCode::Disable => {
            ctx.disable();
            stream.write_status(StatusCode::Success)?;
        }
        RequestCode::Add => {
            let owner = stream.read_string()?;
            let process = stream.read_string()?;
            stream.write_status(status_of(ctx.add(&owner, &process)))?;
        }
        RequestCode::Remove => {
            let owner = stream.read_string()?;
            let process = stream.read_string()?;
            stream.write_status(status_of(ctx.remove(&owner, &process)))?;
        }
        RequestCode::List => match ctx.list() {
            Ok(entries) => {
                stream.write_status(StatusCode::Success)?;
                for entry in entries {
                    write_record(&mut stream, &entry.to_string())?;
                }
                stream.write_i32(0)?;
            }
            Err(e) => stream.write_status(e.status())?,
        },
        RequestCode::Status => {
            let json = serde_json::to_string(&ctx.status())?;
            stream.write_status(StatusCode::Success)?;
            stream.write_string(&json)?;
        }
    }
    Ok(())
}

fn status_of(result: HideResult<()>) -> StatusCode {
    match result {
        Ok(()) => StatusCode::Success,
        Err(e) => {
            log::debug!("request failed: {}", e);
            e.status()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::testing::Fixture, daemon::protocol::read_record};

    fn request<F>(ctx: &HideContext, code: RequestCode, write_args: F) -> UnixStream
    where
        F: FnOnce(&mut UnixStream),
    {
        let (mut client, server) = UnixStream::pair().unwrap();
        client.write_i32(code as i32).unwrap();
        write_args(&mut client);
        handle_connection(server, ctx).unwrap();
        client
    }

    fn add(ctx: &HideContext, owner: &str, process: &str) -> StatusCode {
        let mut reply = request(ctx, RequestCode::Add, |s| {
            s.write_string(owner).unwrap();
            s.write_string(process).unwrap();
        });
        reply.read_status().unwrap()
    }

    #[test]
    fn add_before_enable_is_refused() {
        let fx = Fixture::new();
        assert_eq!(add(&fx.ctx, "com.a", "com.a"), StatusCode::NotEnabled);
    }

    #[test]
    fn enable_add_list() {
        let fx = Fixture::new();
        let mut reply = request(&fx.ctx, RequestCode::Enable, |s| s.write_i32(0).unwrap());
        assert_eq!(reply.read_status().unwrap(), StatusCode::Success);

        let mut reply = request(&fx.ctx, RequestCode::Enable, |s| s.write_i32(0).unwrap());
        assert_eq!(reply.read_status().unwrap(), StatusCode::AlreadyEnabled);

        assert_eq!(add(&fx.ctx, "com.a", ""), StatusCode::Success);
        assert_eq!(add(&fx.ctx, "com.a", "com.a"), StatusCode::AlreadyExists);
        assert_eq!(add(&fx.ctx, "nodot", "x"), StatusCode::InvalidName);

        let mut reply = request(&fx.ctx, RequestCode::List, |_| {});
        assert_eq!(reply.read_status().unwrap(), StatusCode::Success);
        let mut records = Vec::new();
        while let Some(record) = read_record(&mut reply).unwrap() {
            records.push(record);
        }
        assert_eq!(
            records,
            vec![
                "com.a|com.a",
                "com.google.android.gms|com.google.android.gms.unstable"
            ]
        );
    }

    #[test]
    fn remove_and_status() {
        let fx = Fixture::new();
        fx.ctx.enable(false).unwrap();
        fx.ctx.add("com.b", "com.b").unwrap();

        let mut reply = request(&fx.ctx, RequestCode::Remove, |s| {
            s.write_string("com.b").unwrap();
            s.write_string("").unwrap();
        });
        assert_eq!(reply.read_status().unwrap(), StatusCode::Success);

        let mut reply = request(&fx.ctx, RequestCode::Status, |_| {});
        assert_eq!(reply.read_status().unwrap(), StatusCode::Success);
        let status: serde_json::Value =
            serde_json::from_str(&reply.read_string().unwrap()).unwrap();
        assert_eq!(status["phase"], "enabled");
        assert_eq!(status["entries"], 1);

        let mut reply = request(&fx.ctx, RequestCode::Disable, |_| {});
        assert_eq!(reply.read_status().unwrap(), StatusCode::Success);
        assert!(!fx.ctx.is_enabled());
    }

    #[test]
    fn unknown_request_is_an_error() {
        let fx = Fixture::new();
        let (mut client, server) = UnixStream::pair().unwrap();
        client.write_i32(99).unwrap();
        assert!(handle_connection(server, &fx.ctx).is_err());
    }
}
