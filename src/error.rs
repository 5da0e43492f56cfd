// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type composing every subsystem's own error enum.
//!
//! Each subsystem (codec, frame, dispatch, spp, courier, config) owns a
//! narrow error enum close to where it is raised; this type only exists so
//! a [`crate::Server`] can surface a single `Result` to its caller. No
//! `anyhow`/`thiserror` — hand-rolled `Display` + `From`, matching the
//! style `CodecError` already uses.

use std::fmt;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::courier::CourierError;
use crate::dispatch::DispatchError;
use crate::frame::FrameError;
use crate::spp::SppError;

#[derive(Debug)]
pub enum Error {
    Codec(CodecError),
    Frame(FrameError),
    Dispatch(DispatchError),
    Spp(SppError),
    Courier(CourierError),
    Config(ConfigError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::Frame(e) => write!(f, "frame error: {e}"),
            Error::Dispatch(e) => write!(f, "dispatch error: {e}"),
            Error::Spp(e) => write!(f, "spp error: {e}"),
            Error::Courier(e) => write!(f, "courier error: {e}"),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            Error::Frame(e) => Some(e),
            Error::Dispatch(e) => Some(e),
            Error::Spp(e) => Some(e),
            Error::Courier(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Error::Dispatch(e)
    }
}

impl From<SppError> for Error {
    fn from(e: SppError) -> Self {
        Error::Spp(e)
    }
}

impl From<CourierError> for Error {
    fn from(e: CourierError) -> Self {
        Error::Courier(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
