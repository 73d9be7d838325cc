//! Catalog merger (C2): builds one unified list of installed games from
//! four detectors run in sequence. A per-detector failure is logged and
//! does not abort the merge — grounded on the teacher's
//! `games.rs::handle_scan`, which already reports each source's result
//! independently rather than short-circuiting on the first error.

mod heroic;
mod lutris;
mod manual;
mod steam;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::LibraryPathOverrides;

pub use manual::{load_manual_catalog, save_manual_catalog, ManualEntry};
pub use steam::candidate_roots as steam_candidate_roots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameSource {
    Steam,
    Lutris,
    Heroic,
    Manual,
}

impl GameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameSource::Steam => "steam",
            GameSource::Lutris => "lutris",
            GameSource::Heroic => "heroic",
            GameSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub source: GameSource,
    pub id: String,
    pub name: String,
    pub install_path: String,
    #[serde(default)]
    pub cache_hints: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Run all four detectors in stable order (Steam, Lutris, Heroic,
/// manual). A detector error is logged at `warn` and that source
/// simply contributes no games; detectors never cross-deduplicate
/// since every `id` already carries a source prefix.
pub fn build_catalog(overrides: &LibraryPathOverrides, home: Option<&std::path::Path>) -> Vec<Game> {
    let mut games = Vec::new();

    match steam::detect(overrides, home) {
        Ok(found) => games.extend(found),
        Err(e) => log::warn!("steam catalog detection failed: {e}"),
    }

    match lutris::detect(overrides, home) {
        Ok(found) => games.extend(found),
        Err(e) => log::warn!("lutris catalog detection failed: {e}"),
    }

    match heroic::detect(overrides, home) {
        Ok(found) => games.extend(found),
        Err(e) => log::warn!("heroic catalog detection failed: {e}"),
    }

    match manual::detect(home) {
        Ok(found) => games.extend(found),
        Err(e) => log::warn!("manual catalog detection failed: {e}"),
    }

    games
}

pub(crate) fn default_manual_config_path(home: Option<&std::path::Path>) -> Option<PathBuf> {
    home.map(|h| h.join(".config/nvshader/games.json"))
}
