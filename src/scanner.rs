//! Scanner (C3): walks the resolved cache roots and produces
//! `CacheEntry` values, plus the DXVK/vkd3d-proton typed binary header
//! parser shared by the scanner and the validator.
//!
//! Grounded on the teacher's `cache.rs::get_stats` directory-walking
//! shape, generalized to per-kind walkers and a real header parser
//! instead of the teacher's size-only accounting.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{CacheError, Result};
use crate::paths::{dir_size_recursive, CachePaths};
use crate::types::{CacheEntry, CacheKind};

pub const DXVK_MAGIC: &[u8; 4] = b"DXVK";
const HEADER_LEN: usize = 12;

/// A parsed DXVK/vkd3d-proton state-cache file: a 12-byte header
/// followed by `entry_size`-wide payload records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxvkCacheFile {
    pub version: u32,
    pub entry_size: u32,
    pub payload: Vec<u8>,
}

impl DxvkCacheFile {
    pub fn entry_count(&self) -> u64 {
        self.payload.len() as u64 / self.entry_size as u64
    }

    pub fn total_size(&self) -> u64 {
        HEADER_LEN as u64 + self.payload.len() as u64
    }

    /// Serialize back to the exact on-disk byte layout: magic, then
    /// `version`/`entry_size` little-endian, then the payload verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(DXVK_MAGIC);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.entry_size.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Parse a DXVK/vkd3d-proton state-cache file's bytes. See spec §4.3:
/// fails when shorter than the header, bad magic, `entry_size == 0`,
/// or the payload length is not a multiple of `entry_size`.
pub fn parse_dxvk_cache_bytes(path: &Path, bytes: &[u8]) -> Result<DxvkCacheFile> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheError::InvalidCacheFile {
            path: path.to_path_buf(),
            reason: "file shorter than the 12-byte header".to_string(),
        });
    }
    if &bytes[0..4] != DXVK_MAGIC {
        return Err(CacheError::InvalidCacheFile {
            path: path.to_path_buf(),
            reason: "magic bytes do not equal \"DXVK\"".to_string(),
        });
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let entry_size = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    if entry_size == 0 {
        return Err(CacheError::InvalidCacheFile {
            path: path.to_path_buf(),
            reason: "entry_size is zero".to_string(),
        });
    }
    let payload = &bytes[HEADER_LEN..];
    if payload.len() % entry_size as usize != 0 {
        return Err(CacheError::InvalidCacheFile {
            path: path.to_path_buf(),
            reason: format!(
                "payload length {} is not a multiple of entry_size {entry_size}",
                payload.len()
            ),
        });
    }
    let entry_count = payload.len() as u64 / entry_size as u64;
    check_native_size_limit(path, entry_count)?;
    Ok(DxvkCacheFile {
        version,
        entry_size,
        payload: payload.to_vec(),
    })
}

/// `version`/`entry_size` are stored as native 32-bit fields in this
/// format; an `entry_count` that wouldn't fit in one describes a
/// payload too large for the format to have legitimately produced.
fn check_native_size_limit(path: &Path, entry_count: u64) -> Result<()> {
    if entry_count > u32::MAX as u64 {
        return Err(CacheError::CacheTooLarge {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

pub fn read_dxvk_cache_file(path: &Path) -> Result<DxvkCacheFile> {
    let bytes = fs::read(path)?;
    parse_dxvk_cache_bytes(path, &bytes)
}

pub fn write_dxvk_cache_file(path: &Path, file: &DxvkCacheFile) -> Result<()> {
    fs::write(path, file.to_bytes())?;
    Ok(())
}

/// Re-populate `entries` from the resolved roots, reusing the
/// `Vec`'s allocated capacity (clear, not replace).
pub fn rescan(paths: &CachePaths, entries: &mut Vec<CacheEntry>) {
    entries.clear();

    if let Some(root) = &paths.dxvk {
        scan_typed_root(root, CacheKind::Dxvk, "dxvk-cache", entries);
    }
    if let Some(root) = &paths.vkd3d {
        scan_typed_root(root, CacheKind::Vkd3d, "vkd3d-cache", entries);
    }
    if let Some(root) = &paths.fossilize {
        scan_fossilize_root(root, entries);
    }
    if let Some(root) = &paths.nvidia {
        scan_nvidia_root(root, entries);
    }
    if let Some(root) = &paths.mesa {
        scan_mesa_root(root, entries);
    }
    if let Some(root) = &paths.steam_shadercache {
        scan_steam_shadercache_root(root, entries);
    }
}

fn mtime_nanos(path: &Path) -> u128 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// DXVK / vkd3d: every regular file under `root` (recursively) ending
/// in the kind's extension becomes one typed entry.
fn scan_typed_root(root: &Path, kind: CacheKind, extension: &str, entries: &mut Vec<CacheEntry>) {
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match read_dxvk_cache_file(path) {
            Ok(parsed) => {
                let stem = stem_name(path);
                entries.push(CacheEntry {
                    path: path.to_path_buf(),
                    kind,
                    name: stem.clone(),
                    size_bytes: parsed.total_size(),
                    modified_time: mtime_nanos(path),
                    game_name: Some(stem),
                    game_id: None,
                    game_source: None,
                    entry_count: Some(parsed.entry_count()),
                    is_directory: false,
                });
            }
            Err(e) => log::warn!("skipping invalid cache file {:?}: {e}", path),
        }
    }
}

/// Fossilize: top-level `.foz` files plus top-level subdirectories
/// with nonzero recursive size.
fn scan_fossilize_root(root: &Path, entries: &mut Vec<CacheEntry>) {
    let Ok(children) = fs::read_dir(root) else {
        return;
    };
    for child in children.flatten() {
        let path = child.path();
        let Ok(file_type) = child.file_type() else {
            continue;
        };
        if file_type.is_file() {
            if path.extension().and_then(|e| e.to_str()) != Some("foz") {
                continue;
            }
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let stem = stem_name(&path);
            entries.push(CacheEntry {
                path: path.clone(),
                kind: CacheKind::Fossilize,
                name: stem.clone(),
                size_bytes: size,
                modified_time: mtime_nanos(&path),
                game_name: Some(stem),
                game_id: None,
                game_source: None,
                entry_count: None,
                is_directory: false,
            });
        } else if file_type.is_dir() {
            let size = dir_size_recursive(&path);
            if size == 0 {
                continue;
            }
            let basename = stem_name(&path);
            entries.push(CacheEntry {
                path: path.clone(),
                kind: CacheKind::Fossilize,
                name: format!("Fossilize Cache {basename}"),
                size_bytes: size,
                modified_time: mtime_nanos(&path),
                game_name: None,
                game_id: None,
                game_source: None,
                entry_count: None,
                is_directory: true,
            });
        }
    }
}

/// NVIDIA: one entry per top-level subdirectory with nonzero recursive
/// size, named by basename; if none have content, a single aggregate
/// entry covers the whole root.
fn scan_nvidia_root(root: &Path, entries: &mut Vec<CacheEntry>) {
    let mut found_any = false;
    if let Ok(children) = fs::read_dir(root) {
        for child in children.flatten() {
            let path = child.path();
            let Ok(file_type) = child.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let size = dir_size_recursive(&path);
            if size == 0 {
                continue;
            }
            found_any = true;
            let basename = stem_name(&path);
            entries.push(CacheEntry {
                path: path.clone(),
                kind: CacheKind::Nvidia,
                name: format!("Compute Cache {basename}"),
                size_bytes: size,
                modified_time: mtime_nanos(&path),
                game_name: None,
                game_id: None,
                game_source: None,
                entry_count: None,
                is_directory: true,
            });
        }
    }

    if !found_any {
        let size = dir_size_recursive(root);
        if size > 0 {
            entries.push(CacheEntry {
                path: root.to_path_buf(),
                kind: CacheKind::Nvidia,
                name: "NVIDIA Driver Cache".to_string(),
                size_bytes: size,
                modified_time: mtime_nanos(root),
                game_name: None,
                game_id: None,
                game_source: None,
                entry_count: None,
                is_directory: true,
            });
        }
    }
}

/// Mesa: a single aggregate entry over the whole root, when nonempty.
fn scan_mesa_root(root: &Path, entries: &mut Vec<CacheEntry>) {
    let size = dir_size_recursive(root);
    if size == 0 {
        return;
    }
    entries.push(CacheEntry {
        path: root.to_path_buf(),
        kind: CacheKind::Mesa,
        name: "Mesa Shader Cache".to_string(),
        size_bytes: size,
        modified_time: mtime_nanos(root),
        game_name: None,
        game_id: None,
        game_source: None,
        entry_count: None,
        is_directory: true,
    });
}

/// Steam shadercache: one entry per top-level appid subdirectory with
/// nonzero recursive size. Reported as kind `fossilize` per spec §4.3.
fn scan_steam_shadercache_root(root: &Path, entries: &mut Vec<CacheEntry>) {
    let Ok(children) = fs::read_dir(root) else {
        return;
    };
    for child in children.flatten() {
        let path = child.path();
        let Ok(file_type) = child.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let size = dir_size_recursive(&path);
        if size == 0 {
            continue;
        }
        let appid = stem_name(&path);
        entries.push(CacheEntry {
            path: path.clone(),
            kind: CacheKind::Fossilize,
            name: format!("Steam AppID {appid}"),
            size_bytes: size,
            modified_time: mtime_nanos(&path),
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory: true,
        });
    }
}

/// Re-validate a typed file-kind entry: re-parse header and payload
/// divisibility. Used by the policy engine's `validate()`.
pub fn revalidate_typed_entry(path: &Path) -> Result<()> {
    read_dxvk_cache_file(path).map(|_| ())
}
