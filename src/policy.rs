//! Policy engine (C4): statistics, age pruning, size shrinking, and
//! validation over the manager's entry list, operated on in place.
//! Grounded on the teacher's `cache.rs::get_stats`/cleanup shape,
//! generalized to the spec's exact aggregation and retention rules.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scanner::revalidate_typed_entry;
use crate::types::{CacheEntry, CacheKind, CacheStats};

const NANOS_PER_DAY: u128 = 86_400 * 1_000_000_000;

/// Single pass over `entries` producing totals, per-kind totals, file
/// and game counts, and the oldest/newest `modified_time`.
pub fn stats(entries: &[CacheEntry]) -> CacheStats {
    let mut stats = CacheStats::default();
    stats.file_count = entries.len();

    for entry in entries {
        stats.total_bytes += entry.size_bytes;
        *stats.per_kind_bytes.entry(entry.kind).or_insert(0) += entry.size_bytes;
        if entry.game_name.is_some() {
            stats.game_count += 1;
        }
        stats.oldest = Some(match stats.oldest {
            Some(current) => current.min(entry.modified_time),
            None => entry.modified_time,
        });
        stats.newest = Some(match stats.newest {
            Some(current) => current.max(entry.modified_time),
            None => entry.modified_time,
        });
    }

    stats
}

/// Delete every entry whose `modified_time` is older than `days`
/// before now, removing it from `entries` and the filesystem. Returns
/// the number removed. `clean_older_than(0)` removes every entry,
/// since all `modified_time`s are necessarily in the past.
pub fn clean_older_than(entries: &mut Vec<CacheEntry>, days: u64, now_nanos: u128) -> usize {
    let cutoff = now_nanos.saturating_sub(days as u128 * NANOS_PER_DAY);
    let before = entries.len();
    entries.retain(|entry| {
        if entry.modified_time < cutoff {
            delete_artifact(entry);
            false
        } else {
            true
        }
    });
    before - entries.len()
}

/// Convenience wrapper using the real wall clock.
pub fn clean_older_than_now(entries: &mut Vec<CacheEntry>, days: u64) -> usize {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    clean_older_than(entries, days, now)
}

/// Repeatedly delete the oldest entry (ties broken by first occurrence)
/// until total size is at or under `max_bytes`. Returns the number
/// removed. Terminates because deleting a nonempty list's minimum
/// strictly decreases total size.
pub fn shrink_to_size(entries: &mut Vec<CacheEntry>, max_bytes: u64) -> usize {
    let mut removed = 0;
    loop {
        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        if total <= max_bytes || entries.is_empty() {
            break;
        }
        let oldest_index = entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.modified_time)
            .map(|(i, _)| i)
            .expect("loop guard ensures entries is nonempty");
        let victim = entries.remove(oldest_index);
        delete_artifact(&victim);
        removed += 1;
    }
    removed
}

/// Delete every entry whose `game_id` equals `game_id`, removing it
/// from `entries` and the filesystem. Returns bytes freed. Mirrors the
/// teacher's `CacheManager::clear_game`, generalized from a fixed
/// per-kind path list to whichever entries are already associated with
/// the game.
pub fn clear_game_cache(entries: &mut Vec<CacheEntry>, game_id: &str) -> u64 {
    let mut freed = 0u64;
    entries.retain(|entry| {
        if entry.game_id.as_deref() == Some(game_id) {
            freed += entry.size_bytes;
            delete_artifact(entry);
            false
        } else {
            true
        }
    });
    freed
}

/// Result of `validate()`: never mutates state, only reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checked: usize,
    pub invalid: usize,
}

/// Re-check every entry without modifying anything: typed file kinds
/// are re-parsed (header + payload divisibility); directory kinds are
/// confirmed to still exist on disk.
pub fn validate(entries: &[CacheEntry]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for entry in entries {
        report.checked += 1;
        let ok = match entry.kind {
            CacheKind::Dxvk | CacheKind::Vkd3d if !entry.is_directory => {
                revalidate_typed_entry(&entry.path).is_ok()
            }
            _ => entry.path.exists(),
        };
        if !ok {
            report.invalid += 1;
        }
    }
    report
}

fn delete_artifact(entry: &CacheEntry) {
    let result = if entry.is_directory {
        fs::remove_dir_all(&entry.path)
    } else {
        fs::remove_file(&entry.path)
    };
    if let Err(e) = result {
        log::warn!("failed to delete cache artifact {:?}: {e}", entry.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry_at(dir: &std::path::Path, name: &str, size: u64, modified_time: u128) -> CacheEntry {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; size as usize]).unwrap();
        CacheEntry {
            path,
            kind: CacheKind::Fossilize,
            name: name.to_string(),
            size_bytes: size,
            modified_time,
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory: false,
        }
    }

    #[test]
    fn stats_aggregate_matches_invariant_2() {
        let dir = tempdir().unwrap();
        let entries = vec![
            entry_at(dir.path(), "a", 100, 1),
            entry_at(dir.path(), "b", 200, 2),
        ];
        let mut with_game = entries.clone();
        with_game[0].game_name = Some("Game A".to_string());

        let s = stats(&with_game);
        let per_kind_sum: u64 = s.per_kind_bytes.values().sum();
        assert_eq!(per_kind_sum, s.total_bytes);
        assert_eq!(s.total_bytes, 300);
        assert_eq!(s.file_count, with_game.len());
        assert_eq!(s.game_count, 1);
        assert_eq!(s.oldest, Some(1));
        assert_eq!(s.newest, Some(2));
    }

    #[test]
    fn clean_older_than_zero_removes_everything_invariant_3() {
        let dir = tempdir().unwrap();
        let mut entries = vec![
            entry_at(dir.path(), "a", 10, 1),
            entry_at(dir.path(), "b", 10, 2),
        ];
        let removed = clean_older_than(&mut entries, 0, 1_000_000_000_000);
        assert_eq!(removed, 2);
        assert!(entries.is_empty());
    }

    #[test]
    fn s2_size_retention_scenario() {
        let dir = tempdir().unwrap();
        let mut entries = vec![
            entry_at(dir.path(), "a", 100, 1),
            entry_at(dir.path(), "b", 200, 2),
            entry_at(dir.path(), "c", 300, 3),
        ];
        let removed = shrink_to_size(&mut entries, 250);
        assert_eq!(removed, 2);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.path().join("c"));
    }

    #[test]
    fn shrink_to_size_invariant_4_holds_or_list_empties() {
        let dir = tempdir().unwrap();
        let mut entries = vec![entry_at(dir.path(), "a", 1000, 1)];
        shrink_to_size(&mut entries, 1);
        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        assert!(total <= 1 || entries.is_empty());
    }

    #[test]
    fn clear_game_cache_removes_only_matching_entries_and_sums_freed_bytes() {
        let dir = tempdir().unwrap();
        let mut a = entry_at(dir.path(), "a", 100, 1);
        a.game_id = Some("steam:570".to_string());
        let mut b = entry_at(dir.path(), "b", 50, 2);
        b.game_id = Some("steam:570".to_string());
        let c = entry_at(dir.path(), "c", 200, 3);

        let mut entries = vec![a, b, c];
        let freed = clear_game_cache(&mut entries, "steam:570");
        assert_eq!(freed, 150);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.path().join("c"));
    }

    #[test]
    fn validate_flags_missing_directory_without_mutating() {
        let dir = tempdir().unwrap();
        let missing_path = dir.path().join("gone");
        let entries = vec![CacheEntry {
            path: missing_path,
            kind: CacheKind::Mesa,
            name: "Mesa Shader Cache".to_string(),
            size_bytes: 123,
            modified_time: 5,
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory: true,
        }];
        let report = validate(&entries);
        assert_eq!(report.checked, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(entries.len(), 1); // unchanged
    }

    #[test]
    fn validate_accepts_existing_directory() {
        let dir = tempdir().unwrap();
        let entries = vec![CacheEntry {
            path: dir.path().to_path_buf(),
            kind: CacheKind::Mesa,
            name: "Mesa Shader Cache".to_string(),
            size_bytes: 123,
            modified_time: 5,
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory: true,
        }];
        let report = validate(&entries);
        assert_eq!(report.invalid, 0);
    }
}
