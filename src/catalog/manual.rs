//! Manual catalog: a user-maintained `games.json` for installs the
//! other three detectors cannot see (store-less binaries, emulators,
//! anything outside Steam/Lutris/Heroic). Grounded on the teacher's
//! `profile/manager.rs` load/save-to-JSON pattern, retargeted at a
//! flat entry list instead of per-game profiles.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{default_manual_config_path, Game, GameSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    pub name: String,
    pub install_path: String,
    #[serde(default)]
    pub cache_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ManualCatalogFile {
    #[serde(default)]
    entries: Vec<ManualEntry>,
}

pub fn detect(home: Option<&Path>) -> Result<Vec<Game>> {
    let Some(path) = default_manual_config_path(home) else {
        return Ok(Vec::new());
    };
    let entries = load_manual_catalog(&path)?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let id_source = Path::new(&entry.install_path)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| entry.name.clone());
            Game {
                source: GameSource::Manual,
                id: format!("manual:{id_source}"),
                name: entry.name,
                install_path: entry.install_path,
                cache_hints: entry.cache_paths,
                tags: Vec::new(),
            }
        })
        .collect())
}

/// Load the manual catalog file, returning an empty list if it does
/// not exist yet.
pub fn load_manual_catalog(path: &Path) -> Result<Vec<ManualEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manual catalog at {:?}", path))?;
    let file: ManualCatalogFile =
        serde_json::from_str(&contents).context("failed to parse manual catalog JSON")?;
    Ok(file.entries)
}

/// Overwrite the manual catalog file with `entries`, creating parent
/// directories as needed.
pub fn save_manual_catalog(path: &Path, entries: &[ManualEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create manual catalog dir at {:?}", parent))?;
    }
    let file = ManualCatalogFile {
        entries: entries.to_vec(),
    };
    let encoded =
        serde_json::to_string_pretty(&file).context("failed to serialize manual catalog")?;
    fs::write(path, encoded)
        .with_context(|| format!("failed to write manual catalog at {:?}", path))
}
