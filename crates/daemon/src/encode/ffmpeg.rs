//! NVENC encoder invocation.
//!
//! Builds the ffmpeg command line for a Chromecast-compatible H.264 rendition
//! and runs it, streaming `-progress` output through a [`ProgressMonitor`].

use crate::capability::{CapabilitySet, HostEnvironment, HW_ENCODER};
use crate::progress::{DiagnosticTail, ProgressMonitor, ProgressUpdate};
use crate::streams::{StreamKind, StreamSelection};
use castcode_config::{EncodingProfile, RateControl};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Output height of every rendition; width follows the source aspect ratio.
const SCALE_FILTER: &str = "scale_cuda=-2:720:force_original_aspect_ratio=decrease";

/// Highest frame rate the target devices decode reliably.
pub const MAX_DEVICE_FPS: u32 = 30;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// ffmpeg could not be started or its pipes failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipe reader task panicked or was cancelled
    #[error("Output reader failed: {0}")]
    Reader(String),
}

/// Rate-control settings after capability downgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateControlPlan {
    pub rc: RateControl,
    pub multipass_fullres: bool,
}

/// Resolve the requested rate control against the detected capabilities.
///
/// `vbr_hq` implies full-resolution multipass. Without `vbr_hq` support the
/// encode falls back to plain `vbr` with no multipass; without multipass support
/// only the multipass flag is dropped.
pub fn resolve_rate_control(
    requested: RateControl,
    capabilities: CapabilitySet,
    host: HostEnvironment,
) -> RateControlPlan {
    if requested != RateControl::VbrHq {
        return RateControlPlan {
            rc: requested,
            multipass_fullres: false,
        };
    }

    if !capabilities.rc_vbr_hq {
        if host.is_wsl {
            warn!("NVENC build lacks vbr_hq (common under WSL); falling back to vbr without multipass");
        } else {
            warn!("NVENC build lacks vbr_hq; falling back to vbr without multipass");
        }
        return RateControlPlan {
            rc: RateControl::Vbr,
            multipass_fullres: false,
        };
    }

    if !capabilities.multipass_fullres {
        warn!("NVENC build lacks full-resolution multipass; encoding single pass");
        return RateControlPlan {
            rc: RateControl::VbrHq,
            multipass_fullres: false,
        };
    }

    RateControlPlan {
        rc: RateControl::VbrHq,
        multipass_fullres: true,
    }
}

/// Video filter chain: CUDA scaling plus an optional frame-rate cap.
pub fn video_filter(profile: &EncodingProfile) -> String {
    if profile.max_fps > 0 {
        format!("{},fps={}", SCALE_FILTER, profile.max_fps.min(MAX_DEVICE_FPS))
    } else {
        SCALE_FILTER.to_string()
    }
}

/// Parameters for one rendition encode
#[derive(Debug, Clone)]
pub struct FfmpegEncodeParams {
    /// ffmpeg binary to invoke
    pub ffmpeg: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub profile: EncodingProfile,
    /// Whether the source carries a video stream
    pub has_video: bool,
    pub audio: StreamSelection,
    pub subtitles: StreamSelection,
    pub capabilities: CapabilitySet,
    pub host: HostEnvironment,
}

/// Build the ffmpeg command for a rendition encode
///
/// Argument order: global and hardware-decode flags, input, stream maps (video,
/// audio, subtitles), video filter and encoder settings, optional multipass,
/// audio codec settings when audio is mapped, dispositions, then the progress
/// channel and the output path.
///
/// # Arguments
/// * `params` - Paths, profile, selected tracks and detected capabilities
///
/// # Returns
/// A configured Command ready for execution
pub fn build_ffmpeg_command(params: &FfmpegEncodeParams) -> Command {
    let profile = &params.profile;
    let plan = resolve_rate_control(profile.rc, params.capabilities, params.host);

    let mut cmd = Command::new(&params.ffmpeg);
    cmd.args(["-y", "-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]);
    cmd.arg("-i").arg(&params.input_path);

    if params.has_video {
        cmd.args(["-map", "0:v"]);
    }
    cmd.args(params.audio.map_args(StreamKind::Audio));
    cmd.args(params.subtitles.map_args(StreamKind::Subtitle));

    cmd.arg("-vf").arg(video_filter(profile));
    cmd.args(["-c:v", HW_ENCODER]);
    cmd.args(["-rc", plan.rc.as_str()]);
    cmd.args(["-preset", &profile.preset]);
    cmd.args(["-profile:v", &profile.profile]);
    cmd.args(["-level", &profile.level]);
    cmd.arg("-cq").arg(profile.cq.to_string());
    cmd.args(["-maxrate", &profile.max_bitrate]);
    cmd.args(["-bufsize", &profile.bufsize]);
    cmd.args(["-movflags", "+faststart"]);

    if plan.multipass_fullres {
        cmd.args(["-multipass", "fullres"]);
    }

    if !params.audio.is_empty() {
        cmd.args(["-c:a", &profile.audio.codec]);
        cmd.args(["-b:a", &profile.audio.bitrate]);
        cmd.arg("-ac").arg(profile.audio.channels.to_string());
    }

    cmd.args(params.audio.disposition_args(StreamKind::Audio));
    cmd.args(params.subtitles.disposition_args(StreamKind::Subtitle));

    cmd.args(["-progress", "pipe:1", "-nostats"]);
    cmd.arg(&params.output_path);

    cmd
}

/// How an encode ended.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Last lines of diagnostic output.
    pub diagnostics: Vec<String>,
    /// The runtime limit was hit and the process was killed.
    pub timed_out: bool,
}

impl EncodeOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn last_diagnostic(&self) -> Option<&str> {
        self.diagnostics.last().map(String::as_str)
    }
}

/// Run an encode to completion
///
/// Progress lines on stdout are fed to `monitor` and resulting updates are sent
/// on `updates`; stderr is kept in a [`DiagnosticTail`]. Both pipes are drained
/// concurrently and fully read before the outcome is returned.
///
/// # Arguments
/// * `cmd` - Command from [`build_ffmpeg_command`]
/// * `monitor` - Progress state for this encode
/// * `updates` - Receiver of throttled progress updates
/// * `max_runtime` - Kill the encoder after this long, if set
///
/// # Errors
/// Returns an error if the process fails to start or a pipe reader fails.
pub async fn run_ffmpeg(
    cmd: Command,
    monitor: ProgressMonitor,
    updates: mpsc::UnboundedSender<ProgressUpdate>,
    max_runtime: Option<Duration>,
) -> Result<EncodeOutcome, EncodeError> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = ?cmd.as_std(), "Starting encoder");
    let mut child = cmd.spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EncodeError::Reader("stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| EncodeError::Reader("stderr was not captured".to_string()))?;

    let progress_task = tokio::spawn(read_progress(stdout, monitor, updates));
    let diagnostics_task = tokio::spawn(read_diagnostics(stderr));

    let (status, timed_out) = match max_runtime {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                warn!(limit_secs = limit.as_secs(), "Encoder exceeded runtime limit; killing it");
                child.kill().await?;
                (child.wait().await?, true)
            }
        },
        None => (child.wait().await?, false),
    };

    progress_task
        .await
        .map_err(|e| EncodeError::Reader(e.to_string()))?;
    let tail = diagnostics_task
        .await
        .map_err(|e| EncodeError::Reader(e.to_string()))?;

    Ok(EncodeOutcome {
        exit_code: status.code(),
        diagnostics: tail.into_lines(),
        timed_out,
    })
}

async fn read_progress<R>(
    stdout: R,
    mut monitor: ProgressMonitor,
    updates: mpsc::UnboundedSender<ProgressUpdate>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await {
        if let Some(update) = monitor.observe(&line, Instant::now()) {
            // A dropped receiver only means nobody is listening any more.
            let _ = updates.send(update);
        }
    }
    if !monitor.is_finished() {
        debug!(
            last_percent = monitor.last_percent(),
            "Progress channel closed without an end marker"
        );
    }
}

async fn read_diagnostics<R>(stderr: R) -> DiagnosticTail
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut tail = DiagnosticTail::default();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await {
        tail.push(&line);
    }
    tail
}

/// Next line with invalid UTF-8 replaced; `None` at EOF or on a read error.
async fn next_lossy_line<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => Some(String::from_utf8_lossy(buf).trim_end().to_string()),
        Err(e) => {
            warn!(error = %e, "Failed reading encoder output");
            None
        }
    }
}
