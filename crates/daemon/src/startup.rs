//! Worker preflight checks
//!
//! Verifies the encoder toolchain before the worker starts claiming jobs:
//! - ffmpeg runs and reports a parseable version
//! - ffprobe runs

use castcode_config::Config;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ffmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("ffprobe not available: {0}")]
    FfprobeUnavailable(String),
}

/// Parse FFmpeg version string and extract major version number
///
/// Handles various FFmpeg version formats:
/// - Standard: "ffmpeg version 6.1.1 ..."
/// - N-prefixed: "ffmpeg version n7.0-... ..."
///
/// Git snapshot builds ("N-112345-g...") carry no release number and yield `None`.
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .split_whitespace()
        .next()?
        .to_string();

    let version_str = version_part.trim_start_matches('n');
    let major_str = version_str.split(['.', '-']).next()?;

    major_str.parse().ok()
}

/// Run `<binary> -version` and return its stdout.
fn run_version(binary: &Path) -> Result<String, String> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| format!("{} -version failed; is it installed and in PATH? Error: {}", binary.display(), e))?;

    if !output.status.success() {
        return Err(format!("{} -version exited with {}", binary.display(), output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check that ffmpeg runs; returns its major version when it can be parsed.
pub fn check_ffmpeg_available(ffmpeg: &Path) -> Result<Option<u32>, StartupError> {
    let output = run_version(ffmpeg).map_err(StartupError::FfmpegUnavailable)?;
    Ok(parse_ffmpeg_version(&output))
}

pub fn check_ffprobe_available(ffprobe: &Path) -> Result<(), StartupError> {
    run_version(ffprobe)
        .map(|_| ())
        .map_err(StartupError::FfprobeUnavailable)
}

/// Run all worker preflight checks in order
///
/// 1. ffmpeg availability (and version, logged)
/// 2. ffprobe availability
pub fn run_startup_checks(cfg: &Config) -> Result<(), StartupError> {
    let version = check_ffmpeg_available(&cfg.tools.ffmpeg)?;
    match version {
        Some(major) => info!(major, "ffmpeg found"),
        None => info!("ffmpeg found (unreleased build)"),
    }
    check_ffprobe_available(&cfg.tools.ffprobe)?;
    Ok(())
}
