//! Ambient configuration layer.
//!
//! Modeled on the teacher's `config.rs`: `directories::ProjectDirs` for
//! the config home, `toml` for the on-disk format. Every field is
//! optional so an empty or missing file still produces working
//! defaults; the path resolver (`paths.rs`) treats `library_paths` as
//! the first tier of its precedence chain.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_BASENAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheManagerConfig {
    #[serde(default)]
    pub library_paths: LibraryPathOverrides,
    #[serde(default)]
    pub retention: RetentionDefaults,
    #[serde(default)]
    pub replay: ReplayDefaults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryPathOverrides {
    #[serde(default)]
    pub dxvk: Option<PathBuf>,
    #[serde(default)]
    pub vkd3d: Option<PathBuf>,
    #[serde(default)]
    pub nvidia: Option<PathBuf>,
    #[serde(default)]
    pub mesa: Option<PathBuf>,
    #[serde(default)]
    pub fossilize: Option<PathBuf>,
    #[serde(default)]
    pub steam_shadercache: Option<PathBuf>,
    #[serde(default)]
    pub steam_root: Option<PathBuf>,
    #[serde(default)]
    pub lutris_root: Option<PathBuf>,
    #[serde(default)]
    pub heroic_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionDefaults {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    #[serde(default)]
    pub max_total_bytes: Option<u64>,
}

impl Default for RetentionDefaults {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            max_total_bytes: None,
        }
    }
}

fn default_max_age_days() -> u64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDefaults {
    #[serde(default)]
    pub replay_binary: Option<PathBuf>,
    #[serde(default = "default_num_threads")]
    pub num_threads: u32,
    #[serde(default)]
    pub pipeline_cache_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_skip_validation")]
    pub skip_validation: bool,
}

impl Default for ReplayDefaults {
    fn default() -> Self {
        Self {
            replay_binary: None,
            num_threads: default_num_threads(),
            pipeline_cache_dir: None,
            timeout_ms: default_timeout_ms(),
            skip_validation: default_skip_validation(),
        }
    }
}

fn default_num_threads() -> u32 {
    4
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_skip_validation() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
}

impl ConfigPaths {
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("failed to create config dir at {:?}", self.config_dir))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_BASENAME)
    }
}

pub struct ConfigManager {
    paths: ConfigPaths,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "ghostkellz", "nvshader")
            .context("unable to resolve project directories")?;
        let paths = ConfigPaths {
            config_dir: project_dirs.config_dir().to_path_buf(),
        };
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load(&self) -> Result<CacheManagerConfig> {
        self.paths.ensure()?;
        let path = self.paths.config_file();
        if !path.exists() {
            let config = CacheManagerConfig::default();
            self.save(&config)?;
            return Ok(config);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file at {:?}", path))?;
        toml::from_str(&contents).context("failed to parse TOML config")
    }

    pub fn save(&self, config: &CacheManagerConfig) -> Result<()> {
        self.paths.ensure()?;
        let path = self.paths.config_file();
        let encoded =
            toml::to_string_pretty(config).context("failed to serialize config to TOML")?;
        let mut file = fs::File::create(&path)
            .with_context(|| format!("failed to open config file at {:?}", path))?;
        file.write_all(encoded.as_bytes())
            .with_context(|| format!("failed to write config file at {:?}", path))?;
        Ok(())
    }
}
