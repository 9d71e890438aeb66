//! Hardware encoder capability detection.
//!
//! Runs once at worker startup. The resulting [`CapabilitySet`] is immutable and
//! handed to the command builder so requested rate-control settings can be
//! downgraded when the active NVENC build does not support them.

use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Encoder whose help output is inspected.
pub const HW_ENCODER: &str = "h264_nvenc";

/// Rate-control features reported by the hardware encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    /// High-quality variable bitrate (`vbr_hq`) is available.
    pub rc_vbr_hq: bool,
    /// Full-resolution multipass is available.
    pub multipass_fullres: bool,
}

impl Default for CapabilitySet {
    /// Optimistic: everything supported.
    fn default() -> Self {
        Self {
            rc_vbr_hq: true,
            multipass_fullres: true,
        }
    }
}

impl CapabilitySet {
    /// Derive capabilities from `ffmpeg -h encoder=h264_nvenc` output.
    pub fn from_help_output(output: &str) -> Self {
        let lower = output.to_lowercase();
        Self {
            rc_vbr_hq: lower.contains("vbr_hq"),
            multipass_fullres: lower.contains("fullres"),
        }
    }
}

/// Probe the encoder toolchain for rate-control support.
///
/// Any failure to run ffmpeg yields the optimistic default; the command builder
/// then attempts the requested settings as-is.
pub fn probe_capabilities(ffmpeg: &Path) -> CapabilitySet {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "quiet", "-h"])
        .arg(format!("encoder={}", HW_ENCODER))
        .output();

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            warn!(
                status = %output.status,
                "Unable to probe NVENC encoder capabilities; assuming full support"
            );
            return CapabilitySet::default();
        }
        Err(e) => {
            warn!(error = %e, "Unable to probe NVENC encoder capabilities; assuming full support");
            return CapabilitySet::default();
        }
    };

    let caps = CapabilitySet::from_help_output(&String::from_utf8_lossy(&output.stdout));
    info!(
        vbr_hq = caps.rc_vbr_hq,
        multipass_fullres = caps.multipass_fullres,
        "NVENC capabilities detected"
    );
    caps
}

/// Facts about the host that affect hardware encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Running under a WSL kernel, where NVENC rate-control support is often reduced.
    pub is_wsl: bool,
}

impl HostEnvironment {
    pub fn detect() -> Self {
        let release = std::fs::read_to_string("/proc/sys/kernel/osrelease").unwrap_or_default();
        let version = std::fs::read_to_string("/proc/version").unwrap_or_default();
        Self::from_kernel_strings(&release, &version)
    }

    pub fn from_kernel_strings(release: &str, version: &str) -> Self {
        Self {
            is_wsl: release.to_lowercase().contains("microsoft")
                || version.to_lowercase().contains("microsoft"),
        }
    }
}
