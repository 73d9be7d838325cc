//! Steam detector: library-folder enumeration via a tolerant VDF line
//! scanner, `appmanifest_*.acf` parsing, and the `/proc/self/fd/<N>`
//! canonicalization trick that prevents the same physical library from
//! appearing twice under different symlinked paths.
//!
//! Grounded on the teacher's `detection/steam.rs::read_library_folders`/
//! `parse_manifest`, generalized to surface `SizeOnDisk`/`LastPlayed`
//! and to canonicalize every candidate root before deduping.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::LibraryPathOverrides;

use super::{Game, GameSource};

/// The three canonical Steam install layouts, relative to `$HOME`.
pub fn candidate_roots(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join(".local/share/Steam"),
        home.join(".steam/steam"),
        home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
    ]
}

static VDF_PATH_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#""path"\s+"([^"]+)""#).unwrap());
static VDF_KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"\s+"([^"]*)""#).unwrap());

pub fn detect(overrides: &LibraryPathOverrides, home: Option<&Path>) -> Result<Vec<Game>> {
    let mut games = Vec::new();

    let roots: Vec<PathBuf> = if let Some(root) = &overrides.steam_root {
        vec![root.clone()]
    } else if let Some(home) = home {
        candidate_roots(home)
    } else {
        Vec::new()
    };

    let mut libraries: Vec<PathBuf> = Vec::new();
    for root in &roots {
        if !root.exists() {
            continue;
        }
        if let Some(canonical) = canonicalize_via_proc_fd(root) {
            push_unique(&mut libraries, canonical);
        }
        let library_file = root.join("steamapps/libraryfolders.vdf");
        if let Ok(contents) = fs::read_to_string(&library_file) {
            for captures in VDF_PATH_KEY.captures_iter(&contents) {
                let raw = captures[1].replace('\\', "/");
                let candidate = PathBuf::from(raw);
                if candidate.exists() {
                    if let Some(canonical) = canonicalize_via_proc_fd(&candidate) {
                        push_unique(&mut libraries, canonical);
                    }
                }
            }
        }
    }

    for library in &libraries {
        let steamapps = library.join("steamapps");
        let pattern = steamapps.join("appmanifest_*.acf");
        let Some(pattern_str) = pattern.to_str() else {
            continue;
        };
        let entries = match glob::glob(pattern_str) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("bad glob pattern {pattern_str}: {e}");
                continue;
            }
        };
        for entry in entries.flatten() {
            match parse_manifest(&entry) {
                Ok(Some(manifest)) => {
                    let mut cache_hints = Vec::new();
                    let shader_hint = steamapps.join("shadercache").join(&manifest.appid);
                    if shader_hint.exists() {
                        cache_hints.push(shader_hint.to_string_lossy().into_owned());
                    }
                    let mut tags = Vec::new();
                    if let Some(last_played) = manifest.last_played {
                        if last_played > 0 {
                            tags.push(format!("last-played:{last_played}"));
                        }
                    }
                    games.push(Game {
                        source: GameSource::Steam,
                        id: format!("steam:{}", manifest.appid),
                        name: manifest.name,
                        install_path: steamapps
                            .join("common")
                            .join(&manifest.installdir)
                            .to_string_lossy()
                            .into_owned(),
                        cache_hints,
                        tags,
                    });
                }
                Ok(None) => {}
                Err(e) => log::warn!("failed to parse steam manifest {:?}: {e}", entry),
            }
        }
    }

    Ok(games)
}

fn push_unique(libraries: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !libraries.contains(&candidate) {
        libraries.push(candidate);
    }
}

/// Resolve `path` to its canonical form using the `/proc/self/fd/<N>`
/// readlink trick: open the path, then read back the symlink the
/// kernel maintains at `/proc/self/fd/<fd>` for that open
/// file-descriptor. Falls back to `std::fs::canonicalize` if `/proc`
/// is unavailable (non-Linux).
fn canonicalize_via_proc_fd(path: &Path) -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        if let Ok(file) = fs::File::open(path) {
            let fd = file.as_raw_fd();
            let proc_path = format!("/proc/self/fd/{fd}");
            if let Ok(resolved) = fs::read_link(&proc_path) {
                return Some(resolved);
            }
        }
    }
    fs::canonicalize(path).ok()
}

struct Manifest {
    appid: String,
    name: String,
    installdir: String,
    last_played: Option<u64>,
}

fn parse_manifest(path: &Path) -> Result<Option<Manifest>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read steam manifest at {:?}", path))?;
    let mut fields: HashMap<String, String> = HashMap::new();
    for captures in VDF_KEY_VALUE.captures_iter(&content) {
        fields.insert(captures[1].to_string(), captures[2].to_string());
    }
    let appid = fields.get("appid").cloned();
    let name = fields.get("name").cloned();
    let installdir = fields.get("installdir").cloned();
    let last_played = fields.get("LastPlayed").and_then(|v| v.parse().ok());
    Ok(match (appid, name, installdir) {
        (Some(appid), Some(name), Some(installdir)) => Some(Manifest {
            appid,
            name,
            installdir,
            last_played,
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, appid: &str, name: &str, installdir: &str) {
        let contents = format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\t\"{appid}\"\n\t\"name\"\t\t\"{name}\"\n\t\"installdir\"\t\t\"{installdir}\"\n\t\"LastPlayed\"\t\t\"1700000000\"\n\t\"SizeOnDisk\"\t\t\"123456\"\n}}\n"
        );
        fs::write(dir.join(format!("appmanifest_{appid}.acf")), contents).unwrap();
    }

    #[test]
    fn parses_manifest_fields_and_tags_last_played() {
        let dir = tempdir().unwrap();
        let steamapps = dir.path().join("steamapps");
        fs::create_dir_all(&steamapps).unwrap();
        write_manifest(&steamapps, "1245620", "Elden Ring", "ELDEN RING");

        let manifest_path = steamapps.join("appmanifest_1245620.acf");
        let manifest = parse_manifest(&manifest_path).unwrap().unwrap();
        assert_eq!(manifest.appid, "1245620");
        assert_eq!(manifest.name, "Elden Ring");
        assert_eq!(manifest.installdir, "ELDEN RING");
        assert_eq!(manifest.last_played, Some(1_700_000_000));
    }

    #[test]
    fn detect_dedups_when_vdf_lists_its_own_root() {
        // A real Steam install whose libraryfolders.vdf lists its own
        // canonical path as a library (this happens in practice). The
        // root must be counted once, not twice, so its one manifest
        // yields exactly one game.
        let root = tempdir().unwrap();
        let steamapps = root.path().join("steamapps");
        fs::create_dir_all(&steamapps).unwrap();
        write_manifest(&steamapps, "1245620", "Elden Ring", "ELDEN RING");

        let canonical = fs::canonicalize(root.path()).unwrap();
        fs::write(
            steamapps.join("libraryfolders.vdf"),
            format!(
                "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
                canonical.to_string_lossy().replace('\\', "/")
            ),
        )
        .unwrap();

        let overrides = LibraryPathOverrides {
            steam_root: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let games = detect(&overrides, None).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "steam:1245620");
    }
}
