//! `CacheManager`: the top-level façade gluing path resolution,
//! scanning, catalog association, and retention policy into one
//! owned, single-threaded instance (§5: one manager per thread of
//! control, no shared mutable state).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::catalog::{self, Game};
use crate::config::LibraryPathOverrides;
use crate::error::Result;
use crate::paths::CachePaths;
use crate::policy::{self, ValidationReport};
use crate::scanner;
use crate::types::{CacheEntry, CacheStats};
use crate::{association, home_dir};

pub struct CacheManager {
    paths: CachePaths,
    entries: Vec<CacheEntry>,
    catalog: Vec<Game>,
}

impl CacheManager {
    pub fn new(overrides: &LibraryPathOverrides) -> Self {
        let home = home_dir();
        let paths = CachePaths::resolve(overrides);
        let catalog = catalog::build_catalog(overrides, home.as_deref());
        Self {
            paths,
            entries: Vec::new(),
            catalog,
        }
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn catalog(&self) -> &[Game] {
        &self.catalog
    }

    /// Re-resolve paths, rescan all roots, and re-associate against the
    /// current catalog, in place.
    pub fn scan(&mut self, overrides: &LibraryPathOverrides) {
        self.paths = CachePaths::resolve(overrides);
        scanner::rescan(&self.paths, &mut self.entries);
        self.associate();
    }

    pub fn associate(&mut self) {
        association::associate(&mut self.entries, &self.catalog);
    }

    pub fn stats(&self) -> CacheStats {
        policy::stats(&self.entries)
    }

    pub fn clean_older_than(&mut self, days: u64) -> usize {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        policy::clean_older_than(&mut self.entries, days, now)
    }

    pub fn shrink_to_size(&mut self, max_bytes: u64) -> usize {
        policy::shrink_to_size(&mut self.entries, max_bytes)
    }

    pub fn clear_game_cache(&mut self, game_id: &str) -> u64 {
        policy::clear_game_cache(&mut self.entries, game_id)
    }

    pub fn validate(&self) -> ValidationReport {
        policy::validate(&self.entries)
    }

    pub fn reload_catalog(&mut self, overrides: &LibraryPathOverrides) {
        let home = home_dir();
        self.catalog = catalog::build_catalog(overrides, home.as_deref());
    }
}
