//! Association (part of C3): binds cache entries to catalog games via
//! a four-rule priority cascade. Grounded on the teacher's
//! `detection/fingerprint.rs` path-matching helpers, generalized from
//! a single heuristic into the spec's ordered cascade.
//!
//! Rules, in priority order, first match wins:
//! 1. Exact `game_id` match (an entry already carries one, e.g. from a
//!    prior association pass — re-validated against the catalog).
//! 2. Case-insensitive name equality or substring match against
//!    `entry.game_name`.
//! 3. The catalog game's highest-scoring cache hint is a path prefix
//!    of the entry's path — longest matching hint wins.
//! 4. A Steam game's appid appears as a path segment of the entry's
//!    path (covers `steamapps/shadercache/<appid>/...` and similar).

use std::path::Path;

use crate::catalog::{Game, GameSource};
use crate::types::CacheEntry;

/// Associate every entry in `entries` against `catalog`, overwriting
/// `game_id`/`game_name`/`game_source` in place. Running this twice on
/// the same inputs yields identical fields (idempotent).
pub fn associate(entries: &mut [CacheEntry], catalog: &[Game]) {
    for entry in entries.iter_mut() {
        if let Some(game) = find_match(entry, catalog) {
            entry.game_id = Some(game.id.clone());
            entry.game_name = Some(game.name.clone());
            entry.game_source = Some(game.source.as_str().to_string());
        }
    }
}

fn find_match<'a>(entry: &CacheEntry, catalog: &'a [Game]) -> Option<&'a Game> {
    if let Some(by_id) = exact_id_match(entry, catalog) {
        return Some(by_id);
    }
    if let Some(by_name) = name_match(entry, catalog) {
        return Some(by_name);
    }
    if let Some(by_hint) = hint_prefix_match(entry, catalog) {
        return Some(by_hint);
    }
    if let Some(by_appid) = steam_appid_match(entry, catalog) {
        return Some(by_appid);
    }
    None
}

fn exact_id_match<'a>(entry: &CacheEntry, catalog: &'a [Game]) -> Option<&'a Game> {
    let id = entry.game_id.as_deref()?;
    catalog.iter().find(|g| g.id == id)
}

/// Two-phase: an exact case-insensitive match anywhere in the catalog
/// always beats a substring match, even one that appears earlier in
/// catalog order.
fn name_match<'a>(entry: &CacheEntry, catalog: &'a [Game]) -> Option<&'a Game> {
    let name = entry.game_name.as_deref()?.to_lowercase();
    if name.is_empty() {
        return None;
    }
    if let Some(exact) = catalog.iter().find(|g| g.name.to_lowercase() == name) {
        return Some(exact);
    }
    catalog.iter().find(|g| {
        let candidate = g.name.to_lowercase();
        candidate.contains(&name) || name.contains(&candidate)
    })
}

/// Each catalog game's cache hints, plus its `install_path` itself, are
/// path prefixes of entries that belong to it. The longest matching
/// hint (across all games) wins, so a more specific hint beats a
/// broader one. `install_path` is included here because some detectors
/// (e.g. Heroic) never populate `cache_hints`, so it's the only
/// candidate those games can ever match on.
fn hint_prefix_match<'a>(entry: &CacheEntry, catalog: &'a [Game]) -> Option<&'a Game> {
    let mut best: Option<(&Game, usize)> = None;
    for game in catalog {
        let hints = game.cache_hints.iter().chain(std::iter::once(&game.install_path));
        for hint in hints {
            let hint_path = Path::new(hint);
            if entry.path.starts_with(hint_path) {
                let score = hint.len();
                if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                    best = Some((game, score));
                }
            }
        }
    }
    best.map(|(game, _)| game)
}

fn steam_appid_match<'a>(entry: &CacheEntry, catalog: &'a [Game]) -> Option<&'a Game> {
    let segments: Vec<&str> = entry
        .path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    catalog.iter().find(|g| {
        g.source == GameSource::Steam
            && g.id
                .strip_prefix("steam:")
                .map(|appid| segments.contains(&appid))
                .unwrap_or(false)
    })
}
