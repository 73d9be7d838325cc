//! Core data model shared by every component: the cache kind taxonomy,
//! a single discovered cache artifact, and aggregate statistics over a
//! set of them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Closed set of shader/pipeline cache producers this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Dxvk,
    Vkd3d,
    Nvidia,
    Mesa,
    Fossilize,
}

impl CacheKind {
    /// Long, human-facing name.
    pub fn long_name(&self) -> &'static str {
        match self {
            CacheKind::Dxvk => "DXVK State Cache",
            CacheKind::Vkd3d => "vkd3d-proton Shader Cache",
            CacheKind::Nvidia => "NVIDIA Driver Compute Cache",
            CacheKind::Mesa => "Mesa Shader Cache",
            CacheKind::Fossilize => "Fossilize Pipeline Cache",
        }
    }

    /// Short identifier used in manifests and the wire protocol.
    pub fn short_name(&self) -> &'static str {
        match self {
            CacheKind::Dxvk => "dxvk",
            CacheKind::Vkd3d => "vkd3d",
            CacheKind::Nvidia => "nvidia",
            CacheKind::Mesa => "mesa",
            CacheKind::Fossilize => "fossilize",
        }
    }

    /// Canonical file extension; empty for directory-based kinds.
    pub fn extension(&self) -> &'static str {
        match self {
            CacheKind::Dxvk => "dxvk-cache",
            CacheKind::Vkd3d => "vkd3d-cache",
            CacheKind::Nvidia => "",
            CacheKind::Mesa => "",
            CacheKind::Fossilize => "foz",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "dxvk" => Some(CacheKind::Dxvk),
            "vkd3d" => Some(CacheKind::Vkd3d),
            "nvidia" => Some(CacheKind::Nvidia),
            "mesa" => Some(CacheKind::Mesa),
            "fossilize" => Some(CacheKind::Fossilize),
            _ => None,
        }
    }
}

/// One discoverable cache artifact on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub kind: CacheKind,
    /// Display label the scanner assigns at discovery time (e.g.
    /// `"Fossilize Cache elden"` or a stripped file basename). Distinct
    /// from `game_name`, which reflects catalog association and starts
    /// `None` for directory-kind entries.
    pub name: String,
    pub size_bytes: u64,
    /// Nanoseconds since the Unix epoch.
    pub modified_time: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    pub is_directory: bool,
}

impl CacheEntry {
    /// Clears association fields back to the unassociated state.
    pub fn clear_association(&mut self) {
        self.game_name = None;
        self.game_id = None;
        self.game_source = None;
    }
}

/// Aggregate statistics over a set of cache entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_bytes: u64,
    pub file_count: usize,
    pub game_count: usize,
    pub per_kind_bytes: std::collections::BTreeMap<CacheKind, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest: Option<u128>,
}

// BTreeMap requires Ord on the key; derive it narrowly here since the
// public API only needs equality/hash elsewhere.
impl PartialOrd for CacheKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CacheKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.short_name().cmp(other.short_name())
    }
}
