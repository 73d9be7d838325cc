//! Heroic detector: reads the GOG/installed, Epic (legendary)/installed,
//! and sideload library JSON files. Each file may be an array of game
//! objects or an object mapping name → game object; both are
//! normalized at the `serde_json::Value` boundary before per-object
//! extraction, per the Design Notes' "tagged JSON object unions".

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::config::LibraryPathOverrides;

use super::{Game, GameSource};

const SOURCE_FILES: &[(&str, &str)] = &[
    ("gog", "gog_store/installed.json"),
    ("epic", "legendaryConfig/legendary/installed.json"),
    ("sideload", "sideload_apps/library.json"),
];

pub fn detect(overrides: &LibraryPathOverrides, home: Option<&Path>) -> Result<Vec<Game>> {
    let mut games = Vec::new();

    let root = overrides
        .heroic_root
        .clone()
        .or_else(|| home.map(|h| h.join(".config/heroic")));
    let Some(root) = root else {
        return Ok(games);
    };
    if !root.exists() {
        return Ok(games);
    }

    for (flavor, relative) in SOURCE_FILES {
        let path = root.join(relative);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&contents) else {
            log::warn!("failed to parse heroic json at {:?}", path);
            continue;
        };
        for object in normalize_entries(value) {
            if let Some(game) = game_from_object(flavor, &object) {
                games.push(game);
            }
        }
    }

    Ok(games)
}

/// Accepts either `[ {...}, {...} ]` or `{ "name": {...}, ... }` and
/// returns a flat list of the per-game JSON objects either way.
fn normalize_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => map.into_values().collect(),
        _ => Vec::new(),
    }
}

fn game_from_object(flavor: &str, object: &Value) -> Option<Game> {
    let identity = first_string(object, &["app_name", "appName", "title"])?;
    let display_name =
        first_string(object, &["title", "app_name"]).unwrap_or_else(|| identity.clone());
    let install_path = first_string(object, &["install_path", "installPath", "folder_name"])?;

    let mut tags = Vec::new();
    if let Some(platform) = first_string(object, &["platform"]) {
        tags.push(format!("platform:{platform}"));
    }

    Some(Game {
        source: GameSource::Heroic,
        id: format!("heroic-{flavor}:{identity}"),
        name: display_name,
        install_path,
        cache_hints: Vec::new(),
        tags,
    })
}

fn first_string(object: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = object.get(*key) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}
