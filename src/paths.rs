//! Path resolver (C1): locates the six known cache roots and the game
//! catalog sources via environment and filesystem probes.
//!
//! Precedence per root, highest first: explicit config override → the
//! documented environment variable (where one exists) → a list of
//! default paths checked for existence in order. Only paths that
//! currently exist are returned.

use std::path::{Path, PathBuf};

use crate::config::LibraryPathOverrides;

/// Resolved roots; each is `None` if nothing in the precedence chain
/// pointed to an existing path.
#[derive(Debug, Clone, Default)]
pub struct CachePaths {
    pub dxvk: Option<PathBuf>,
    pub vkd3d: Option<PathBuf>,
    pub nvidia: Option<PathBuf>,
    pub mesa: Option<PathBuf>,
    pub fossilize: Option<PathBuf>,
    pub steam_shadercache: Option<PathBuf>,
}

impl CachePaths {
    pub fn resolve(overrides: &LibraryPathOverrides) -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);

        let dxvk = first_existing(
            overrides.dxvk.clone(),
            std::env::var_os("DXVK_STATE_CACHE_PATH").map(PathBuf::from),
            || home.as_ref().map(|h| h.join(".cache/dxvk")),
        );

        let vkd3d = first_existing(
            overrides.vkd3d.clone(),
            std::env::var_os("VKD3D_SHADER_CACHE_PATH").map(PathBuf::from),
            || home.as_ref().map(|h| h.join(".cache/vkd3d-proton")),
        );

        let nvidia = first_existing(overrides.nvidia.clone(), None, || {
            home.as_ref().map(|h| h.join(".nv/ComputeCache"))
        });

        let mesa = first_existing(overrides.mesa.clone(), None, || {
            if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME") {
                Some(PathBuf::from(xdg).join("mesa_shader_cache"))
            } else {
                home.as_ref().map(|h| h.join(".cache/mesa_shader_cache"))
            }
        });

        let fossilize = first_existing(overrides.fossilize.clone(), None, || {
            home.as_ref().and_then(|h| {
                crate::catalog::steam_candidate_roots(h)
                    .into_iter()
                    .map(|root| root.join("steamapps/shadercache"))
                    .find(|p| p.exists())
            })
        });

        let steam_shadercache = first_existing(
            overrides.steam_shadercache.clone(),
            None,
            || {
                home.as_ref().and_then(|h| {
                    crate::catalog::steam_candidate_roots(h)
                        .into_iter()
                        .map(|root| root.join("steamapps/shadercache"))
                        .find(|p| p.exists())
                })
            },
        );

        Self {
            dxvk,
            vkd3d,
            nvidia,
            mesa,
            fossilize,
            steam_shadercache,
        }
    }
}

/// Evaluate the precedence chain: override, then env-derived path, then
/// a lazily computed default. Each candidate is accepted only if it
/// exists on disk.
fn first_existing(
    override_path: Option<PathBuf>,
    env_path: Option<PathBuf>,
    default_fn: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(p) = override_path {
        if p.exists() {
            return Some(p);
        }
    }
    if let Some(p) = env_path {
        if p.exists() {
            return Some(p);
        }
    }
    default_fn().filter(|p| p.exists())
}

/// Recursive byte size of a directory. Only regular files and
/// directories are traversed; symlinks, sockets, and other special
/// files are skipped.
pub fn dir_size_recursive(path: &Path) -> u64 {
    let mut total = 0u64;
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_file() {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        } else if file_type.is_dir() {
            total += dir_size_recursive(&entry.path());
        }
    }
    total
}

/// Recursive count of regular files under a directory.
pub fn file_count_recursive(path: &Path) -> usize {
    let mut total = 0usize;
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_file() {
            total += 1;
        } else if file_type.is_dir() {
            total += file_count_recursive(&entry.path());
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn override_wins_over_everything_when_it_exists() {
        let dir = tempdir().unwrap();
        let overrides = LibraryPathOverrides {
            dxvk: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let paths = CachePaths::resolve(&overrides);
        assert_eq!(paths.dxvk.as_deref(), Some(dir.path()));
    }

    #[test]
    fn nonexistent_override_is_ignored() {
        let overrides = LibraryPathOverrides {
            dxvk: Some(PathBuf::from("/definitely/does/not/exist/anywhere")),
            ..Default::default()
        };
        let paths = CachePaths::resolve(&overrides);
        // Falls through to env/default, which in a test sandbox will
        // typically not exist either.
        assert_ne!(
            paths.dxvk.as_deref(),
            Some(Path::new("/definitely/does/not/exist/anywhere"))
        );
    }

    #[test]
    fn dir_size_recursive_sums_nested_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("b.txt"), b"world!").unwrap();

        assert_eq!(dir_size_recursive(dir.path()), 5 + 6);
        assert_eq!(file_count_recursive(dir.path()), 2);
    }

    #[test]
    fn empty_directory_has_zero_size_and_count() {
        let dir = tempdir().unwrap();
        assert_eq!(dir_size_recursive(dir.path()), 0);
        assert_eq!(file_count_recursive(dir.path()), 0);
    }
}
