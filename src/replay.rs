//! Replay orchestrator (C5a): locates the external `fossilize_replay`
//! binary and drives single-file, directory, and manager-scope pipeline
//! replay. Grounded on the teacher's `runner.rs::handle_run` process
//! launching shape, generalized to a polling `wait`-with-timeout loop
//! since the spec requires killing the child on expiry rather than
//! blocking indefinitely.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheKind};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub replay_binary: Option<PathBuf>,
    pub num_threads: u32,
    pub pipeline_cache_dir: Option<PathBuf>,
    pub timeout_ms: u64,
    pub skip_validation: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            replay_binary: None,
            num_threads: 4,
            pipeline_cache_dir: None,
            timeout_ms: 30_000,
            skip_validation: true,
        }
    }
}

impl From<crate::config::ReplayDefaults> for ReplayConfig {
    fn from(defaults: crate::config::ReplayDefaults) -> Self {
        Self {
            replay_binary: defaults.replay_binary,
            num_threads: defaults.num_threads,
            pipeline_cache_dir: defaults.pipeline_cache_dir,
            timeout_ms: defaults.timeout_ms,
            skip_validation: defaults.skip_validation,
        }
    }
}

/// Outcome of one `.foz` file's replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    Completed,
    Failed,
}

/// Progress snapshot delivered to the caller's callback.
#[derive(Debug, Clone)]
pub struct ReplayProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_file: PathBuf,
    pub status: Option<ReplayStatus>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaySummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Locate the `fossilize_replay` binary: explicit override first, then
/// well-known system directories, then two Steam-bundled locations
/// relative to `$HOME`.
pub fn resolve_replay_binary(config: &ReplayConfig, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(explicit) = &config.replay_binary {
        if explicit.is_file() {
            return Some(explicit.clone());
        }
    }

    let system_candidates = [
        PathBuf::from("/usr/bin/fossilize_replay"),
        PathBuf::from("/usr/local/bin/fossilize_replay"),
        PathBuf::from("/opt/fossilize/fossilize_replay"),
    ];
    if let Some(found) = system_candidates.into_iter().find(|p| p.is_file()) {
        return Some(found);
    }

    if let Some(home) = home {
        let steam_candidates = [
            home.join(".local/share/Steam/steamapps/common/Fossilize/bin/fossilize_replay"),
            home.join(".steam/steam/steamapps/common/Fossilize/bin/fossilize_replay"),
        ];
        if let Some(found) = steam_candidates.into_iter().find(|p| p.is_file()) {
            return Some(found);
        }
    }

    None
}

/// Run replay on a single `.foz` file. Returns `Completed` iff the
/// child process exits with status code 0.
pub fn replay_file(
    binary: &Path,
    target: &Path,
    config: &ReplayConfig,
) -> Result<ReplayStatus> {
    let mut cmd = Command::new(binary);
    cmd.arg("--spirv-val").arg("0");
    cmd.arg("--num-threads").arg(config.num_threads.to_string());
    if let Some(cache_dir) = &config.pipeline_cache_dir {
        cmd.arg("--pipeline-cache").arg(cache_dir);
    }
    cmd.arg(target);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn()?;
    let exit_status = wait_with_timeout(child, Duration::from_millis(config.timeout_ms))?;
    Ok(match exit_status {
        Some(status) if status.success() => ReplayStatus::Completed,
        _ => ReplayStatus::Failed,
    })
}

/// Poll `try_wait()` until the child exits or `timeout` elapses, at
/// which point the child is killed. `Ok(None)` means the timeout fired.
fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
    }
}

/// Enumerate `.foz` files directly under `dir` and replay them
/// sequentially, aggregating completed/failed counts.
pub fn replay_directory(
    binary: &Path,
    dir: &Path,
    config: &ReplayConfig,
    mut on_progress: Option<&mut dyn FnMut(ReplayProgress)>,
) -> Result<(usize, usize)> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("foz"))
        .collect();
    files.sort();

    let total = files.len();
    let mut completed = 0;
    let mut failed = 0;

    for file in files {
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(ReplayProgress {
                total,
                completed,
                failed,
                current_file: file.clone(),
                status: None,
            });
        }
        let status = replay_file(binary, &file, config)?;
        match status {
            ReplayStatus::Completed => completed += 1,
            ReplayStatus::Failed => failed += 1,
        }
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(ReplayProgress {
                total,
                completed,
                failed,
                current_file: file,
                status: Some(status),
            });
        }
    }

    Ok((completed, failed))
}

/// Replay every fossilize-kind entry in the manager's entry list.
/// Non-fossilize entries are counted into `skipped`.
pub fn replay_entries(
    entries: &[CacheEntry],
    config: &ReplayConfig,
    home: Option<&Path>,
    mut on_progress: Option<&mut dyn FnMut(ReplayProgress)>,
) -> Result<ReplaySummary> {
    let binary = resolve_replay_binary(config, home).ok_or(CacheError::FossilizeNotFound)?;
    let mut summary = ReplaySummary::default();

    for entry in entries {
        if entry.kind != CacheKind::Fossilize {
            summary.skipped += 1;
            continue;
        }

        if let Some(cb) = on_progress.as_deref_mut() {
            cb(ReplayProgress {
                total: entries.len(),
                completed: summary.completed,
                failed: summary.failed,
                current_file: entry.path.clone(),
                status: None,
            });
        }

        let entry_status = if entry.is_directory {
            let (completed, failed) = replay_directory(&binary, &entry.path, config, None)?;
            summary.completed += completed;
            summary.failed += failed;
            // Directory replay aggregates many files under one entry;
            // there's no single outcome to report here.
            None
        } else {
            let status = replay_file(&binary, &entry.path, config)?;
            match status {
                ReplayStatus::Completed => summary.completed += 1,
                ReplayStatus::Failed => summary.failed += 1,
            }
            Some(status)
        };

        if let Some(cb) = on_progress.as_deref_mut() {
            cb(ReplayProgress {
                total: entries.len(),
                completed: summary.completed,
                failed: summary.failed,
                current_file: entry.path.clone(),
                status: entry_status,
            });
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_replay_binary_prefers_explicit_override() {
        let dir = tempdir().unwrap();
        let binary = dir.path().join("fossilize_replay");
        std::fs::write(&binary, b"#!/bin/sh\n").unwrap();

        let config = ReplayConfig {
            replay_binary: Some(binary.clone()),
            ..Default::default()
        };
        assert_eq!(resolve_replay_binary(&config, None), Some(binary));
    }

    #[test]
    fn resolve_replay_binary_none_when_nothing_found() {
        let config = ReplayConfig {
            replay_binary: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        // Real system paths won't exist in a clean CI sandbox either,
        // but we only assert this doesn't find the bogus override.
        let found = resolve_replay_binary(&config, None);
        assert_ne!(found, Some(PathBuf::from("/definitely/not/here")));
    }

    #[test]
    fn replay_directory_finds_no_foz_files_in_empty_dir() {
        let dir = tempdir().unwrap();
        let binary = PathBuf::from("/bin/true");
        let (completed, failed) =
            replay_directory(&binary, dir.path(), &ReplayConfig::default(), None).unwrap();
        assert_eq!(completed, 0);
        assert_eq!(failed, 0);
    }

    #[test]
    fn replay_file_reports_completed_for_successful_exit() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("game.foz");
        std::fs::write(&target, b"foz bytes").unwrap();

        let status = replay_file(Path::new("/bin/true"), &target, &ReplayConfig::default())
            .unwrap();
        assert_eq!(status, ReplayStatus::Completed);
    }

    #[test]
    fn replay_file_reports_failed_for_nonzero_exit() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("game.foz");
        std::fs::write(&target, b"foz bytes").unwrap();

        let status = replay_file(Path::new("/bin/false"), &target, &ReplayConfig::default())
            .unwrap();
        assert_eq!(status, ReplayStatus::Failed);
    }

    #[test]
    fn replay_entries_finish_callback_reports_the_real_outcome() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("game.foz");
        std::fs::write(&target, b"foz bytes").unwrap();

        let entries = vec![CacheEntry {
            path: target,
            kind: CacheKind::Fossilize,
            name: "game".to_string(),
            size_bytes: 9,
            modified_time: 0,
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory: false,
        }];

        let config = ReplayConfig {
            replay_binary: Some(PathBuf::from("/bin/false")),
            ..Default::default()
        };

        let mut last_status = None;
        {
            let mut on_progress = |progress: ReplayProgress| {
                if progress.status.is_some() {
                    last_status = progress.status;
                }
            };
            replay_entries(&entries, &config, None, Some(&mut on_progress)).unwrap();
        }

        assert_eq!(last_status, Some(ReplayStatus::Failed));
    }
}
