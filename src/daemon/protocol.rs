// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire format between the client commands and the daemon.
//!
//! Integers are native-endian `i32`, strings are a `usize` length followed by
//! UTF-8 bytes. A `List` reply is a status followed by `i32`-length records of
//! `owner|process`, terminated by a zero length.

use std::{
    fmt,
    io::{Read, Write},
    os::unix::net::UnixStream,
};

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RequestCode {
    Enable = 0,
    Disable = 1,
    Add = 2,
    Remove = 3,
    List = 4,
    Status = 5,
}

impl TryFrom<i32> for RequestCode {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Self::Enable,
            1 => Self::Disable,
            2 => Self::Add,
            3 => Self::Remove,
            4 => Self::List,
            5 => Self::Status,
            _ => bail!("Invalid request code: {}", value),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    DaemonError = 1,
    AlreadyEnabled = 2,
    NotEnabled = 3,
    AlreadyExists = 4,
    NotFound = 5,
    NoNamespace = 6,
    InvalidName = 7,
}

impl TryFrom<i32> for StatusCode {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Self::Success,
            1 => Self::DaemonError,
            2 => Self::AlreadyEnabled,
            3 => Self::NotEnabled,
            4 => Self::AlreadyExists,
            5 => Self::NotFound,
            6 => Self::NoNamespace,
            7 => Self::InvalidName,
            _ => bail!("Invalid status code: {}", value),
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Success => "success",
            Self::DaemonError => "daemon error",
            Self::AlreadyEnabled => "hiding is already enabled",
            Self::NotEnabled => "hiding is not enabled",
            Self::AlreadyExists => "target already exists in hide list",
            Self::NotFound => "target does not exist in hide list",
            Self::NoNamespace => "kernel has no mount namespace support",
            Self::InvalidName => "invalid package or process name",
        };
        f.write_str(msg)
    }
}

pub trait UnixStreamExt {
    fn read_i32(&mut self) -> Result<i32>;
    fn read_usize(&mut self) -> Result<usize>;
    fn read_string(&mut self) -> Result<String>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_usize(&mut self, value: usize) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;

    fn write_status(&mut self, status: StatusCode) -> Result<()> {
        self.write_i32(status as i32)
    }

    fn read_status(&mut self) -> Result<StatusCode> {
        StatusCode::try_from(self.read_i32()?)
    }
}

impl UnixStreamExt for UnixStream {
    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn read_usize(&mut self) -> Result<usize> {
        let mut buf = [0u8; std::mem::size_of::<usize>()];
        self.read_exact(&mut buf)?;
        Ok(usize::from_ne_bytes(buf))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_usize()?;
        if len > MAX_STRING_LEN {
            bail!("String too long: {} bytes", len);
        }
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_usize(&mut self, value: usize) -> Result<()> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_usize(value.len())?;
        self.write_all(value.as_bytes())?;
        Ok(())
    }
}

const MAX_STRING_LEN: usize = 4096;

/// Writes one `owner|process` list record.
pub fn write_record(stream: &mut UnixStream, record: &str) -> Result<()> {
    let len = i32::try_from(record.len())?;
    stream.write_i32(len)?;
    stream.write_all(record.as_bytes())?;
    Ok(())
}

/// Reads one list record, `None` at the terminator.
pub fn read_record(stream: &mut UnixStream) -> Result<Option<String>> {
    let len = stream.read_i32()?;
    if len <= 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; usize::try_from(len)?];
    stream.read_exact(&mut buf)?;
    Ok(Some(String::from_utf8(buf)?))
}
