//! Lutris detector: a tolerant flat key-value scan over `*.yml` game
//! definitions, per spec — not a `pga.db` SQLite query (the teacher's
//! approach; see SPEC_FULL.md's REDESIGN FLAGS and DESIGN.md).

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::config::LibraryPathOverrides;

use super::{Game, GameSource};

const RECOGNIZED_KEYS: &[&str] = &["name", "slug", "directory", "cache", "runner"];

pub fn detect(overrides: &LibraryPathOverrides, home: Option<&Path>) -> Result<Vec<Game>> {
    let mut games = Vec::new();

    let mut dirs = Vec::new();
    if let Some(root) = &overrides.lutris_root {
        dirs.push(root.join("games"));
    } else if let Some(home) = home {
        dirs.push(home.join(".local/share/lutris/games"));
        dirs.push(home.join(".config/lutris/games"));
    }

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yml") {
                continue;
            }
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            if let Some(game) = parse_flat_yaml(&contents) {
                games.push(game);
            }
        }
    }

    Ok(games)
}

fn parse_flat_yaml(contents: &str) -> Option<Game> {
    let mut fields: std::collections::HashMap<&str, String> = std::collections::HashMap::new();
    for line in contents.lines() {
        // Only top-level (unindented) keys are recognized.
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !RECOGNIZED_KEYS.contains(&key) {
            continue;
        }
        let value = unquote(value.trim());
        fields.insert(key, value);
    }

    let name = fields.get("name")?.clone();
    let slug = fields.get("slug")?.clone();
    let directory = fields.get("directory")?.clone();
    if name.is_empty() || slug.is_empty() || directory.is_empty() {
        return None;
    }

    let mut cache_hints = Vec::new();
    if let Some(cache) = fields.get("cache") {
        if !cache.is_empty() {
            cache_hints.push(cache.clone());
        }
    }

    let mut tags = Vec::new();
    if let Some(runner) = fields.get("runner") {
        if !runner.is_empty() {
            tags.push(format!("runner:{runner}"));
        }
    }

    Some(Game {
        source: GameSource::Lutris,
        id: format!("lutris:{slug}"),
        name,
        install_path: directory,
        cache_hints,
        tags,
    })
}

/// Trim surrounding ASCII double quotes, if present on both ends.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}
