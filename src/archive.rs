//! Archive & package bundler (C6a): portable on-disk bundles for
//! moving cache entries between machines, plus the GPU-tagged
//! `.nvcache` package variant used by the P2P transfer layer.
//!
//! Grounded on the teacher's JSON load/save pattern in
//! `profile/manager.rs`, generalized to a manifest + chunked-copy
//! bundle directory instead of a single flat file.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::gpu::GpuProfile;
use crate::types::CacheEntry;

const MANIFEST_VERSION: i64 = 1;
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub cache_type: String,
    pub original_path: PathBuf,
    pub stored_path: String,
    pub is_directory: bool,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: i64,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    pub entries: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuProfile>,
}

const MANIFEST_FILE: &str = "manifest.json";
const CACHE_DIR: &str = "cache";

/// Export `entries` into a bundle directory at `bundle_dir`. Each
/// entry is assigned a dense index matching its position in the slice
/// (per §5's ordering guarantee); a single entry's copy failure is
/// logged and skipped rather than aborting the whole bundle.
pub fn export(
    bundle_dir: &Path,
    entries: &[CacheEntry],
    game: Option<&str>,
    created_at: u64,
) -> Result<()> {
    let cache_dir = bundle_dir.join(CACHE_DIR);
    fs::create_dir_all(&cache_dir)?;

    let mut manifest_entries = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let basename = entry
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("entry-{index}"));
        let stored_name = format!("{index}_{basename}");
        let stored_path = cache_dir.join(&stored_name);

        let copy_result = if entry.is_directory {
            copy_dir_recursive(&entry.path, &stored_path)
        } else {
            copy_file_chunked(&entry.path, &stored_path)
        };

        if let Err(e) = copy_result {
            log::warn!("failed to export entry {:?}: {e}", entry.path);
            continue;
        }

        manifest_entries.push(ManifestEntry {
            cache_type: entry.kind.short_name().to_string(),
            original_path: entry.path.clone(),
            stored_path: stored_name,
            is_directory: entry.is_directory,
            size_bytes: entry.size_bytes,
        });
    }

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        created_at,
        game: game.map(|g| g.to_string()),
        entries: manifest_entries,
        gpu: None,
    };
    write_manifest(bundle_dir, &manifest)
}

/// Export with an attached GPU profile and short-name `type` per
/// entry, for the `.nvcache` package variant. Uses the identical
/// bundle directory layout.
pub fn export_package(
    bundle_dir: &Path,
    entries: &[CacheEntry],
    game: Option<&str>,
    created_at: u64,
    gpu: GpuProfile,
) -> Result<()> {
    export(bundle_dir, entries, game, created_at)?;
    let mut manifest = read_manifest(bundle_dir)?;
    manifest.gpu = Some(gpu);
    write_manifest(bundle_dir, &manifest)
}

/// Import a bundle, restoring each entry either to its original path
/// or rebased under `override_dir` (if supplied) using the stored
/// basename. Rejects any manifest version other than 1.
pub fn import(bundle_dir: &Path, override_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let manifest = read_manifest(bundle_dir)?;
    if manifest.version != MANIFEST_VERSION {
        return Err(CacheError::UnsupportedManifest {
            path: bundle_dir.join(MANIFEST_FILE),
            found: manifest.version,
            expected: MANIFEST_VERSION,
        });
    }

    let cache_dir = bundle_dir.join(CACHE_DIR);
    let mut restored = Vec::new();
    for entry in &manifest.entries {
        let stored_path = cache_dir.join(&entry.stored_path);
        let destination = match override_dir {
            Some(dir) => {
                let basename = entry
                    .original_path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(&entry.stored_path));
                dir.join(basename)
            }
            None => entry.original_path.clone(),
        };

        let copy_result = if entry.is_directory {
            copy_dir_recursive(&stored_path, &destination)
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_file_chunked(&stored_path, &destination)
        };

        match copy_result {
            Ok(()) => restored.push(destination),
            Err(e) => log::warn!("failed to restore entry {:?}: {e}", entry.original_path),
        }
    }

    Ok(restored)
}

/// Import a `.nvcache` package: like [`import`], but first validates
/// the package-specific shape (a GPU profile and a non-empty `entries`
/// array), raising `InvalidPackage` rather than the generic manifest
/// errors `import` would otherwise surface.
pub fn import_package(bundle_dir: &Path, override_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let manifest = read_manifest(bundle_dir)?;
    if manifest.gpu.is_none() {
        return Err(CacheError::InvalidPackage {
            path: manifest_path(bundle_dir),
            reason: "package manifest is missing the gpu field".to_string(),
        });
    }
    if manifest.entries.is_empty() {
        return Err(CacheError::InvalidPackage {
            path: manifest_path(bundle_dir),
            reason: "package manifest has an empty entries array".to_string(),
        });
    }
    import(bundle_dir, override_dir)
}

fn manifest_path(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(MANIFEST_FILE)
}

fn write_manifest(bundle_dir: &Path, manifest: &Manifest) -> Result<()> {
    fs::create_dir_all(bundle_dir)?;
    let encoded = serde_json::to_string_pretty(manifest).map_err(|e| CacheError::InvalidManifest {
        path: manifest_path(bundle_dir),
        field: format!("serialization failed: {e}"),
    })?;
    fs::write(manifest_path(bundle_dir), encoded)?;
    Ok(())
}

fn read_manifest(bundle_dir: &Path) -> Result<Manifest> {
    let path = manifest_path(bundle_dir);
    let contents = fs::read_to_string(&path)?;
    serde_json::from_str(&contents).map_err(|e| CacheError::InvalidManifest {
        path,
        field: format!("malformed manifest json: {e}"),
    })
}

fn copy_file_chunked(source: &Path, destination: &Path) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut reader = File::open(source)?;
    let mut writer = File::create(destination)?;
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
    }
    Ok(())
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_child = destination.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_child)?;
        } else if file_type.is_file() {
            copy_file_chunked(&entry.path(), &dest_child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CacheKind;
    use tempfile::tempdir;

    fn sample_entry(path: PathBuf, size: u64, is_directory: bool) -> CacheEntry {
        CacheEntry {
            path,
            kind: CacheKind::Dxvk,
            name: "sample".to_string(),
            size_bytes: size,
            modified_time: 0,
            game_name: None,
            game_id: None,
            game_source: None,
            entry_count: None,
            is_directory,
        }
    }

    #[test]
    fn invariant_7_export_then_import_round_trips_file_bytes() {
        let source_dir = tempdir().unwrap();
        let original = source_dir.path().join("game.dxvk-cache");
        fs::write(&original, b"some cache bytes to preserve exactly").unwrap();

        let entries = vec![sample_entry(original.clone(), 37, false)];
        let bundle = tempdir().unwrap();
        export(bundle.path(), &entries, Some("Elden Ring"), 1_700_000_000).unwrap();

        fs::remove_file(&original).unwrap();
        let restored = import(bundle.path(), None).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(fs::read(&original).unwrap(), b"some cache bytes to preserve exactly");
    }

    #[test]
    fn export_then_import_restores_directory_recursively() {
        let source_dir = tempdir().unwrap();
        let game_dir = source_dir.path().join("fossilize_game");
        fs::create_dir(&game_dir).unwrap();
        fs::write(game_dir.join("a.foz"), b"pipeline a").unwrap();
        fs::write(game_dir.join("b.foz"), b"pipeline b").unwrap();

        let entries = vec![sample_entry(game_dir.clone(), 20, true)];
        let bundle = tempdir().unwrap();
        export(bundle.path(), &entries, None, 1_700_000_000).unwrap();

        fs::remove_dir_all(&game_dir).unwrap();
        import(bundle.path(), None).unwrap();
        assert_eq!(fs::read(game_dir.join("a.foz")).unwrap(), b"pipeline a");
        assert_eq!(fs::read(game_dir.join("b.foz")).unwrap(), b"pipeline b");
    }

    #[test]
    fn import_with_override_rebases_under_new_directory() {
        let source_dir = tempdir().unwrap();
        let original = source_dir.path().join("game.dxvk-cache");
        fs::write(&original, b"bytes").unwrap();

        let entries = vec![sample_entry(original.clone(), 5, false)];
        let bundle = tempdir().unwrap();
        export(bundle.path(), &entries, None, 1_700_000_000).unwrap();

        let override_dir = tempdir().unwrap();
        let restored = import(bundle.path(), Some(override_dir.path())).unwrap();
        assert_eq!(restored[0], override_dir.path().join("game.dxvk-cache"));
        assert!(restored[0].exists());
    }

    #[test]
    fn s3_rejects_unsupported_manifest_version() {
        let bundle = tempdir().unwrap();
        fs::create_dir_all(bundle.path().join(CACHE_DIR)).unwrap();
        fs::write(
            bundle.path().join(MANIFEST_FILE),
            r#"{"version":2,"created_at":1,"entries":[]}"#,
        )
        .unwrap();

        let result = import(bundle.path(), None);
        assert!(matches!(
            result,
            Err(CacheError::UnsupportedManifest { found: 2, expected: 1, .. })
        ));
    }

    #[test]
    fn package_export_attaches_gpu_profile_to_manifest() {
        let source_dir = tempdir().unwrap();
        let original = source_dir.path().join("game.dxvk-cache");
        fs::write(&original, b"bytes").unwrap();
        let entries = vec![sample_entry(original, 5, false)];

        let bundle = tempdir().unwrap();
        let gpu = GpuProfile::new(crate::gpu::NVIDIA_VENDOR_ID, 0x2684, "550.1".into(), 16384);
        export_package(bundle.path(), &entries, Some("Elden Ring"), 1, gpu.clone()).unwrap();

        let manifest = read_manifest(bundle.path()).unwrap();
        assert_eq!(manifest.gpu, Some(gpu));
    }

    #[test]
    fn import_package_rejects_manifest_without_gpu() {
        let source_dir = tempdir().unwrap();
        let original = source_dir.path().join("game.dxvk-cache");
        fs::write(&original, b"bytes").unwrap();
        let entries = vec![sample_entry(original, 5, false)];

        let bundle = tempdir().unwrap();
        export(bundle.path(), &entries, None, 1).unwrap();

        let result = import_package(bundle.path(), None);
        assert!(matches!(result, Err(CacheError::InvalidPackage { .. })));
    }

    #[test]
    fn import_package_rejects_empty_entries_array() {
        let bundle = tempdir().unwrap();
        fs::create_dir_all(bundle.path().join(CACHE_DIR)).unwrap();
        let gpu = GpuProfile::new(crate::gpu::NVIDIA_VENDOR_ID, 0x2684, "550.1".into(), 16384);
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            created_at: 1,
            game: None,
            entries: Vec::new(),
            gpu: Some(gpu),
        };
        write_manifest(bundle.path(), &manifest).unwrap();

        let result = import_package(bundle.path(), None);
        assert!(matches!(result, Err(CacheError::InvalidPackage { .. })));
    }

    #[test]
    fn import_package_accepts_well_formed_package() {
        let source_dir = tempdir().unwrap();
        let original = source_dir.path().join("game.dxvk-cache");
        fs::write(&original, b"bytes").unwrap();
        let entries = vec![sample_entry(original.clone(), 5, false)];

        let bundle = tempdir().unwrap();
        let gpu = GpuProfile::new(crate::gpu::NVIDIA_VENDOR_ID, 0x2684, "550.1".into(), 16384);
        export_package(bundle.path(), &entries, Some("Elden Ring"), 1, gpu).unwrap();

        fs::remove_file(&original).unwrap();
        let restored = import_package(bundle.path(), None).unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn single_entry_copy_failure_does_not_abort_bundle() {
        crate::init_test_logger();
        let source_dir = tempdir().unwrap();
        let good = source_dir.path().join("good.dxvk-cache");
        fs::write(&good, b"ok").unwrap();
        let missing = source_dir.path().join("missing.dxvk-cache");

        let entries = vec![
            sample_entry(missing, 1, false),
            sample_entry(good, 2, false),
        ];
        let bundle = tempdir().unwrap();
        export(bundle.path(), &entries, None, 1).unwrap();

        let manifest = read_manifest(bundle.path()).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].size_bytes, 2);
    }
}
