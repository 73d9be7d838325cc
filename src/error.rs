//! Closed error-kind set for the cache engine.
//!
//! Every fallible operation documented in the spec's error table surfaces
//! one of these variants (or, at a module boundary, a more specific
//! submodule error that converts into this one via `#[from]`).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("$HOME is not set")]
    NoHomeDir,

    #[error("invalid cache file at {path:?}: {reason}")]
    InvalidCacheFile { path: PathBuf, reason: String },

    #[error("cache file at {path:?} exceeds native size limits")]
    CacheTooLarge { path: PathBuf },

    #[error("manifest at {path:?} is missing a required field: {field}")]
    InvalidManifest { path: PathBuf, field: String },

    #[error("manifest at {path:?} has unsupported version {found} (expected {expected})")]
    UnsupportedManifest {
        path: PathBuf,
        found: i64,
        expected: i64,
    },

    #[error("package at {path:?} is malformed: {reason}")]
    InvalidPackage { path: PathBuf, reason: String },

    #[error("no fossilize_replay binary could be located")]
    FossilizeNotFound,

    #[error("failed to create socket: {0}")]
    SocketCreateFailed(String),

    #[error("failed to bind socket: {0}")]
    BindFailed(String),

    #[error("failed to listen on socket: {0}")]
    ListenFailed(String),

    #[error("failed to connect: {0}")]
    ConnectFailed(String),

    #[error("failed to send datagram/stream data: {0}")]
    SendFailed(String),

    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
