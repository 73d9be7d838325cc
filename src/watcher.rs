//! Watcher (C5b): polls up to five cache directories for filesystem
//! notifications and classifies them into a small logical event set.
//! Uses `notify`'s `PollWatcher` explicitly rather than the
//! recommended/debounced backend, since the spec's cooperative
//! scheduling model (§5) requires a caller-driven, non-blocking
//! `run()` loop rather than a background OS-event thread.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_WATCHED_DIRS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Deleted,
    CompilationEnd,
    Modified,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// Session-scoped totals, one counter per logical event kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchCounters {
    pub created: u64,
    pub deleted: u64,
    pub compilation_end: u64,
    pub modified: u64,
}

impl WatchCounters {
    fn record(&mut self, kind: WatchEventKind) {
        match kind {
            WatchEventKind::Created => self.created += 1,
            WatchEventKind::Deleted => self.deleted += 1,
            WatchEventKind::CompilationEnd => self.compilation_end += 1,
            WatchEventKind::Modified => self.modified += 1,
        }
    }
}

pub struct CacheWatcher {
    watcher: PollWatcher,
    receiver: Receiver<notify::Result<Event>>,
    counters: WatchCounters,
    callback: Option<Box<dyn FnMut(&WatchEvent)>>,
    running: bool,
}

impl CacheWatcher {
    /// Register up to `MAX_WATCHED_DIRS` directories. Directories that
    /// don't exist are skipped rather than erroring, since not every
    /// cache root is present on every system.
    pub fn new(directories: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let config = NotifyConfig::default().with_poll_interval(POLL_INTERVAL);
        let mut watcher = PollWatcher::new(tx, config)
            .context("failed to create filesystem poll watcher")?;

        for dir in directories.iter().take(MAX_WATCHED_DIRS) {
            if !dir.is_dir() {
                continue;
            }
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch directory {:?}", dir))?;
        }

        Ok(Self {
            watcher,
            receiver: rx,
            counters: WatchCounters::default(),
            callback: None,
            running: true,
        })
    }

    pub fn set_callback(&mut self, callback: Box<dyn FnMut(&WatchEvent)>) {
        self.callback = Some(callback);
    }

    pub fn counters(&self) -> WatchCounters {
        self.counters
    }

    /// Drain any events currently queued, classify each, invoke the
    /// callback, and update counters. Non-blocking.
    pub fn poll_once(&mut self) {
        while let Ok(result) = self.receiver.try_recv() {
            let Ok(event) = result else { continue };
            for path in &event.paths {
                if let Some(kind) = classify(&event.kind) {
                    self.counters.record(kind);
                    if let Some(callback) = &mut self.callback {
                        callback(&WatchEvent {
                            path: path.clone(),
                            kind,
                        });
                    }
                }
            }
        }
    }

    /// Cooperative polling loop at ~100 ms cadence, until `stop()` is
    /// called (from the callback, or by another owner of a shared
    /// `running` flag in a real embedding).
    pub fn run(&mut self) {
        while self.running {
            self.poll_once();
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }
}

/// Precedence: create beats delete beats close-write beats modify.
/// `Modify` is only surfaced when neither create nor close-write
/// applies for the same raw event (see spec §4.5 / Open Questions:
/// this conflation is carried over from the source unmodified).
fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Created),
        EventKind::Remove(_) => Some(WatchEventKind::Deleted),
        EventKind::Access(notify::event::AccessKind::Close(
            notify::event::AccessMode::Write,
        )) => Some(WatchEventKind::CompilationEnd),
        EventKind::Modify(_) => Some(WatchEventKind::Modified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn create_beats_everything_else() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Created)
        );
    }

    #[test]
    fn remove_classifies_as_deleted() {
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(WatchEventKind::Deleted)
        );
    }

    #[test]
    fn close_write_classifies_as_compilation_end() {
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Some(WatchEventKind::CompilationEnd)
        );
    }

    #[test]
    fn plain_modify_classifies_as_modified() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any)),
            Some(WatchEventKind::Modified)
        );
    }

    #[test]
    fn counters_accumulate_per_kind() {
        let mut counters = WatchCounters::default();
        counters.record(WatchEventKind::Created);
        counters.record(WatchEventKind::Created);
        counters.record(WatchEventKind::Modified);
        assert_eq!(counters.created, 2);
        assert_eq!(counters.modified, 1);
        assert_eq!(counters.deleted, 0);
    }

    #[test]
    fn watcher_skips_nonexistent_directories_without_erroring() {
        let bogus = PathBuf::from("/definitely/does/not/exist/anywhere");
        let watcher = CacheWatcher::new(&[bogus]);
        assert!(watcher.is_ok());
    }

    #[test]
    fn watcher_caps_registration_at_five_directories() {
        use tempfile::tempdir;
        let dirs: Vec<_> = (0..8)
            .map(|i| {
                let dir = tempdir().unwrap();
                let path = dir.path().to_path_buf();
                std::mem::forget(dir); // keep directory alive for the test
                path
            })
            .collect();
        let watcher = CacheWatcher::new(&dirs);
        assert!(watcher.is_ok());
    }
}
