//! nvshader-core: discovery, retention, replay, and LAN sharing engine
//! for Linux GPU shader caches (DXVK, vkd3d-proton, NVIDIA, Mesa,
//! Fossilize). A library crate only — no CLI surface lives here.

pub mod archive;
pub mod association;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gpu;
pub mod manager;
pub mod p2p;
pub mod paths;
pub mod policy;
pub mod replay;
pub mod scanner;
pub mod types;
pub mod units;
pub mod watcher;

use std::path::PathBuf;

pub use error::{CacheError, Result};
pub use manager::CacheManager;

/// `$HOME`, resolved once via the environment. Most lookups in this
/// crate tolerate a missing home by yielding no results; callers that
/// need `NoHomeDir` to be an error (e.g. the CLI collaborator) should
/// check this directly.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Install `env_logger` once so tests exercising a `log::warn!` path
/// (detector failures, skipped archive entries, watcher errors) print
/// their records under `cargo test -- --nocapture`. Production code
/// never calls this; installing a logger stays the collaborator's job.
#[cfg(test)]
pub(crate) fn init_test_logger() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
