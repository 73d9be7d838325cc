//! GPU profile detection and architecture classification.
//!
//! Architecture is a closed label derived from NVIDIA PCI device-id
//! ranges (the teacher crate instead guesses architecture from marketing
//! names in `gpu.rs::detect_architecture`; this module follows the
//! spec's device-id-range approach, which is vendor-neutral and works
//! without a name string).

use serde::{Deserialize, Serialize};

pub const NVIDIA_VENDOR_ID: u32 = 0x10de;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuProfile {
    pub vendor_id: u32,
    pub device_id: u32,
    pub driver_version: String,
    pub architecture: String,
    pub vram_mb: u32,
}

impl GpuProfile {
    pub fn new(vendor_id: u32, device_id: u32, driver_version: String, vram_mb: u32) -> Self {
        let architecture = if vendor_id == NVIDIA_VENDOR_ID {
            nvidia_architecture(device_id).to_string()
        } else {
            "unknown".to_string()
        };
        Self {
            vendor_id,
            device_id,
            driver_version,
            architecture,
            vram_mb,
        }
    }

    /// Two profiles are compatible iff the vendor matches and, for
    /// NVIDIA, the architecture label matches exactly. Device id need
    /// not match inside the same architecture.
    pub fn compatible_with(&self, other: &GpuProfile) -> bool {
        if self.vendor_id != other.vendor_id {
            return false;
        }
        if self.vendor_id == NVIDIA_VENDOR_ID {
            return self.architecture == other.architecture;
        }
        true
    }
}

/// Closed label set, ordered newest-first. Ranges are coarse
/// approximations of NVIDIA's public device-id allocations.
fn nvidia_architecture(device_id: u32) -> &'static str {
    match device_id {
        0x2900..=0x29ff | 0x2d00..=0x2dff => "Blackwell",
        0x2600..=0x28ff => "Ada Lovelace",
        0x2200..=0x25ff => "Ampere",
        0x1e00..=0x21ff => "Turing",
        0x1d00..=0x1dff => "Volta-Turing",
        0x1b00..=0x1cff => "Pascal",
        0x1380..=0x17ff => "Maxwell",
        0x0fc0..=0x13ff => "Kepler",
        _ => "unknown",
    }
}
