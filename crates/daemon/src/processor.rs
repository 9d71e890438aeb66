//! Per-job pipeline run by a GPU worker.
//!
//! allocate → source check → probe → skip if already converted → encode while
//! tracking progress → validate → optional source removal → final report.

use crate::capability::{CapabilitySet, HostEnvironment};
use crate::encode::{build_ffmpeg_command, run_ffmpeg, FfmpegEncodeParams};
use crate::jobs::{Job, JobStatus, JobStatusUpdate};
use crate::naming::rendition_path;
use crate::probe::{Ffprobe, MediaAnalysis, MediaProber};
use crate::progress::{ProgressMonitor, ALLOCATED_PROGRESS};
use crate::streams::select_streams;
use crate::validate::validate_output;
use castcode_config::{Config, EncodingProfile};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Why a job ended `Failed`. The `Display` text becomes the job message.
#[derive(Debug, Error)]
pub enum JobError {
    /// Source file does not exist
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    /// Encoder exited unsuccessfully
    #[error("FFmpeg exited with code {code}; last log line: {last_line}")]
    EncodeFailure { code: i32, last_line: String },

    /// Encoder succeeded but the rendition did not validate
    #[error("Encoding finished but produced missing or invalid output at {0}")]
    OutputInvalid(PathBuf),

    /// Encoder was killed after the runtime limit
    #[error("Encoding exceeded the runtime limit of {0}s and was stopped")]
    TimedOut(u64),

    /// Anything else (encoder could not start, worker task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Sink for job status reports.
///
/// Implementations swallow transport failures; a lost update must never abort
/// the job that produced it.
pub trait StatusReporter: Send + Sync {
    fn report(&self, job_id: &str, update: JobStatusUpdate) -> impl Future<Output = ()> + Send;
}

/// Worker-side settings that apply to every job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    pub ffmpeg: PathBuf,
    pub remove_original_after_success: bool,
    /// `None` lets an encode run as long as it needs.
    pub max_encode_runtime: Option<Duration>,
    /// Worker-side profiles for jobs that arrive without a snapshot.
    pub profiles: BTreeMap<String, EncodingProfile>,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        let limit = config.worker.max_encode_runtime_secs;
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            remove_original_after_success: config.operational.remove_original_after_success,
            max_encode_runtime: (limit > 0).then(|| Duration::from_secs(limit)),
            profiles: config.profiles.clone(),
        }
    }
}

/// Drives claimed jobs to a terminal status.
pub struct JobProcessor {
    settings: ProcessorSettings,
    capabilities: CapabilitySet,
    host: HostEnvironment,
    prober: Arc<dyn MediaProber>,
}

impl JobProcessor {
    pub fn new(
        settings: ProcessorSettings,
        capabilities: CapabilitySet,
        host: HostEnvironment,
        prober: Arc<dyn MediaProber>,
    ) -> Self {
        Self {
            settings,
            capabilities,
            host,
            prober,
        }
    }

    /// Processor using ffprobe from the configured toolchain.
    pub fn from_config(config: &Config, capabilities: CapabilitySet, host: HostEnvironment) -> Self {
        Self::new(
            ProcessorSettings::from_config(config),
            capabilities,
            host,
            Arc::new(Ffprobe::new(config.tools.ffprobe.clone())),
        )
    }

    /// Run `job` to completion, reporting through `reporter`.
    ///
    /// Returns the terminal update that was reported.
    pub async fn process<R: StatusReporter>(&self, job: &Job, reporter: &R) -> JobStatusUpdate {
        info!(job_id = job.short_id(), path = %job.path.display(), "Processing job");
        reporter
            .report(
                &job.id,
                JobStatusUpdate::new(
                    JobStatus::Running,
                    Some(ALLOCATED_PROGRESS),
                    Some("Allocated to GPU worker".to_string()),
                ),
            )
            .await;

        let update = match self.execute(job, reporter).await {
            Ok(message) => {
                info!(job_id = job.short_id(), "{}", message);
                JobStatusUpdate::new(JobStatus::Completed, Some(100), Some(message))
            }
            Err(e) => {
                error!(job_id = job.short_id(), path = %job.path.display(), error = %e, "Job failed");
                JobStatusUpdate::new(JobStatus::Failed, None, Some(e.to_string()))
            }
        };

        reporter.report(&job.id, update.clone()).await;
        update
    }

    async fn execute<R: StatusReporter>(&self, job: &Job, reporter: &R) -> Result<String, JobError> {
        if tokio::fs::metadata(&job.path).await.is_err() {
            return Err(JobError::SourceMissing(job.path.clone()));
        }

        let analysis = self.analyse(&job.path).await;
        let destination = rendition_path(&job.path);

        if self
            .validate(destination.clone(), analysis.duration_secs)
            .await
        {
            let message = format!(
                "Output already present at {}; skipping encode",
                destination.display()
            );
            return Ok(self.finish_success(job, &destination, &analysis, message).await);
        }

        let profile = self.resolve_profile(job);
        let params = FfmpegEncodeParams {
            ffmpeg: self.settings.ffmpeg.clone(),
            input_path: job.path.clone(),
            output_path: destination.clone(),
            profile,
            has_video: analysis.has_video,
            audio: select_streams(&analysis.audio_streams),
            subtitles: select_streams(&analysis.subtitle_streams),
            capabilities: self.capabilities,
            host: self.host,
        };
        debug!(
            job_id = job.short_id(),
            audio = params.audio.streams.len(),
            subtitles = params.subtitles.streams.len(),
            "Streams selected"
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = ProgressMonitor::new(analysis.duration_secs, Instant::now());
        let encode = run_ffmpeg(
            build_ffmpeg_command(&params),
            monitor,
            tx,
            self.settings.max_encode_runtime,
        );
        let forward = async {
            while let Some(update) = rx.recv().await {
                reporter
                    .report(
                        &job.id,
                        JobStatusUpdate::new(
                            JobStatus::Running,
                            Some(update.percent),
                            Some(update.message),
                        ),
                    )
                    .await;
            }
        };
        let (outcome, ()) = tokio::join!(encode, forward);
        let outcome = outcome.map_err(|e| JobError::Internal(format!("Failed to run encoder: {}", e)))?;

        if outcome.timed_out {
            let limit = self
                .settings
                .max_encode_runtime
                .map(|d| d.as_secs())
                .unwrap_or(0);
            return Err(JobError::TimedOut(limit));
        }

        if !outcome.success() {
            for line in &outcome.diagnostics {
                error!(job_id = job.short_id(), "ffmpeg: {}", line);
            }
            return Err(JobError::EncodeFailure {
                code: outcome.exit_code.unwrap_or(-1),
                last_line: outcome.last_diagnostic().unwrap_or("").to_string(),
            });
        }

        if !self
            .validate(destination.clone(), analysis.duration_secs)
            .await
        {
            return Err(JobError::OutputInvalid(destination));
        }

        let message = format!("Encoded to {}", destination.display());
        Ok(self.finish_success(job, &destination, &analysis, message).await)
    }

    /// The job's snapshot, else the worker's profile of that name, else defaults.
    fn resolve_profile(&self, job: &Job) -> EncodingProfile {
        if let Some(profile) = &job.encoding {
            return profile.clone();
        }
        if let Some(profile) = self.settings.profiles.get(&job.profile) {
            debug!(job_id = job.short_id(), profile = %job.profile, "Using worker profile");
            return profile.clone();
        }
        warn!(job_id = job.short_id(), profile = %job.profile, "No encoding settings for profile; using defaults");
        EncodingProfile::default()
    }

    /// Best-effort source removal after a successful (or skipped) encode.
    async fn finish_success(
        &self,
        job: &Job,
        destination: &Path,
        analysis: &MediaAnalysis,
        message: String,
    ) -> String {
        if !self.settings.remove_original_after_success {
            return message;
        }

        if !self
            .validate(destination.to_path_buf(), analysis.duration_secs)
            .await
        {
            warn!(
                job_id = job.short_id(),
                path = %destination.display(),
                "Rendition failed re-validation; keeping original"
            );
            return message;
        }

        match tokio::fs::remove_file(&job.path).await {
            Ok(()) => {
                info!(job_id = job.short_id(), path = %job.path.display(), "Original removed");
                format!("{} (original removed)", message)
            }
            Err(e) => {
                warn!(
                    job_id = job.short_id(),
                    path = %job.path.display(),
                    error = %e,
                    "Failed to remove original"
                );
                message
            }
        }
    }

    /// Probe the source. On failure nothing is known: no duration and no
    /// streams, so ffmpeg picks the streams itself.
    async fn analyse(&self, path: &Path) -> MediaAnalysis {
        let prober = Arc::clone(&self.prober);
        let target = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || prober.probe(&target)).await;

        match result {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Probe failed; continuing without stream analysis");
                MediaAnalysis::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Probe task failed; continuing without stream analysis");
                MediaAnalysis::default()
            }
        }
    }

    async fn validate(&self, path: PathBuf, expected_duration_secs: f64) -> bool {
        let prober = Arc::clone(&self.prober);
        tokio::task::spawn_blocking(move || {
            validate_output(prober.as_ref(), &path, expected_duration_secs)
        })
        .await
        .unwrap_or(false)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingReporter;
    use super::*;
    use crate::validate::test_support::FakeProber;
    use std::fs;
    use tempfile::TempDir;

    fn settings(ffmpeg: impl Into<PathBuf>) -> ProcessorSettings {
        ProcessorSettings {
            ffmpeg: ffmpeg.into(),
            remove_original_after_success: false,
            max_encode_runtime: None,
            profiles: BTreeMap::new(),
        }
    }

    fn processor(settings: ProcessorSettings, prober: FakeProber) -> JobProcessor {
        JobProcessor::new(
            settings,
            CapabilitySet::default(),
            HostEnvironment::default(),
            Arc::new(prober),
        )
    }

    fn job_for(path: &Path) -> Job {
        Job::new(
            path.to_path_buf(),
            "movies",
            "chromecast",
            Some(EncodingProfile::default()),
        )
    }

    /// Executable stand-in for ffmpeg running `body` under sh.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-ffmpeg.sh");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    /// Writes "data" to the last argument, like a successful encode.
    #[cfg(unix)]
    const WRITE_OUTPUT: &str = "for last; do :; done\n\
                                printf 'out_time_us=30000000\\nprogress=end\\n'\n\
                                printf data > \"$last\"";

    /// Saves the argument list, one per line, to `args.txt` beside the script.
    #[cfg(unix)]
    const RECORD_ARGS: &str = "printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args.txt\"";

    #[cfg(unix)]
    fn recorded_args(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("args.txt"))
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        assert_eq!(ProcessorSettings::from_config(&config).max_encode_runtime, None);

        config.worker.max_encode_runtime_secs = 3600;
        config.operational.remove_original_after_success = true;
        let settings = ProcessorSettings::from_config(&config);
        assert_eq!(settings.max_encode_runtime, Some(Duration::from_secs(3600)));
        assert!(settings.remove_original_after_success);
        assert_eq!(settings.profiles, config.profiles);
    }

    #[test]
    fn test_profile_resolution_order() {
        let mut worker_profile = EncodingProfile::default();
        worker_profile.cq = 27;
        let mut snapshot = EncodingProfile::default();
        snapshot.cq = 21;
        let mut settings = settings("ffmpeg");
        settings
            .profiles
            .insert("chromecast".to_string(), worker_profile.clone());
        let processor = processor(settings, FakeProber::default());

        let mut job = Job::new(PathBuf::from("/m/a.mkv"), "movies", "chromecast", Some(snapshot.clone()));
        assert_eq!(processor.resolve_profile(&job), snapshot);

        job.encoding = None;
        assert_eq!(processor.resolve_profile(&job), worker_profile);

        job.profile = "unknown".to_string();
        assert_eq!(processor.resolve_profile(&job), EncodingProfile::default());
    }

    #[test]
    fn test_error_messages() {
        let err = JobError::EncodeFailure {
            code: 1,
            last_line: "Conversion failed!".to_string(),
        };
        assert_eq!(err.to_string(), "FFmpeg exited with code 1; last log line: Conversion failed!");
        assert!(JobError::OutputInvalid(PathBuf::from("/m/a-chromecast.mp4"))
            .to_string()
            .contains("missing or invalid output"));
    }

    #[tokio::test]
    async fn test_missing_source_fails_immediately() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("gone.mkv");
        let reporter = RecordingReporter::default();

        let result = processor(settings("/nonexistent/ffmpeg"), FakeProber::default())
            .process(&job_for(&source), &reporter)
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("gone.mkv"));

        let updates = reporter.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].progress, Some(ALLOCATED_PROGRESS));
        assert_eq!(updates[0].message.as_deref(), Some("Allocated to GPU worker"));
    }

    #[tokio::test]
    async fn test_existing_rendition_skips_encode() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let destination = dir.path().join("film-chromecast.mp4");
        fs::write(&source, b"source").unwrap();
        fs::write(&destination, b"rendition").unwrap();
        let prober = FakeProber::default()
            .with_duration(&source, 600.0)
            .with_duration(&destination, 600.5);

        // A missing ffmpeg proves no encode is launched.
        let result = processor(settings("/nonexistent/ffmpeg"), prober)
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert!(result.message.unwrap().contains("skipping encode"));
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_encoder_start_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();

        let result = processor(settings("/nonexistent/ffmpeg"), FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("Failed to run encoder"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_zero_without_output_fails() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();

        let result = processor(settings("true"), FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("missing or invalid output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_fails() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "for last; do :; done\n: > \"$last\"");

        let result = processor(settings(ffmpeg), FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("missing or invalid output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_code_and_last_line() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'No NVENC capable devices found' >&2\nexit 187");

        let result = processor(settings(ffmpeg), FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(
            result.message.as_deref(),
            Some("FFmpeg exited with code 187; last log line: No NVENC capable devices found")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_encode_reports_progress_then_completed() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let destination = dir.path().join("film-chromecast.mp4");
        fs::write(&source, b"source").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), WRITE_OUTPUT);
        let prober = FakeProber::default()
            .with_duration(&source, 60.0)
            .with_duration(&destination, 60.2);
        let reporter = RecordingReporter::default();

        let result = processor(settings(ffmpeg), prober)
            .process(&job_for(&source), &reporter)
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.progress, Some(100));
        assert!(destination.exists());
        assert!(source.exists());

        let updates = reporter.updates();
        assert_eq!(updates.first().unwrap().progress, Some(ALLOCATED_PROGRESS));
        assert_eq!(updates.last().unwrap().status, JobStatus::Completed);
        let progress: Vec<u8> = updates.iter().filter_map(|u| u.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_duration_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let destination = dir.path().join("film-chromecast.mp4");
        fs::write(&source, b"source").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), WRITE_OUTPUT);
        let prober = FakeProber::default()
            .with_duration(&source, 60.0)
            .with_duration(&destination, 30.0);

        let result = processor(settings(ffmpeg), prober)
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("missing or invalid output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_original_removed_after_success() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let mut settings = settings(fake_ffmpeg(dir.path(), WRITE_OUTPUT));
        settings.remove_original_after_success = true;

        // Probe failure: no duration, so only presence gates removal.
        let result = processor(settings, FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert!(result.message.unwrap().ends_with("(original removed)"));
        assert!(!source.exists());
        assert!(dir.path().join("film-chromecast.mp4").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runtime_limit_kills_encode() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let mut settings = settings(fake_ffmpeg(dir.path(), "exec sleep 30"));
        settings.max_encode_runtime = Some(Duration::from_millis(200));

        let result = processor(settings, FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.message.unwrap().contains("runtime limit"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_leaves_stream_selection_to_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), &format!("{}\n{}", RECORD_ARGS, WRITE_OUTPUT));

        let result = processor(settings(ffmpeg), FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        let args = recorded_args(dir.path());
        assert!(!args.iter().any(|a| a == "-map"), "unexpected stream maps: {:?}", args);
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert!(args.iter().any(|a| a == "-c:v"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_profile_applies_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(&source, b"source").unwrap();
        let mut settings = settings(fake_ffmpeg(dir.path(), &format!("{}\n{}", RECORD_ARGS, WRITE_OUTPUT)));
        let mut worker_profile = EncodingProfile::default();
        worker_profile.cq = 27;
        worker_profile.max_bitrate = "5M".to_string();
        settings.profiles.insert("chromecast".to_string(), worker_profile);
        let mut job = job_for(&source);
        job.encoding = None;

        let result = processor(settings, FakeProber::default())
            .process(&job, &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        let args = recorded_args(dir.path());
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        assert_eq!(value_of("-cq").as_deref(), Some("27"));
        assert_eq!(value_of("-maxrate").as_deref(), Some("5M"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_revalidation_keeps_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let destination = dir.path().join("film-chromecast.mp4");
        fs::write(&source, b"source").unwrap();
        let mut settings = settings(fake_ffmpeg(dir.path(), WRITE_OUTPUT));
        settings.remove_original_after_success = true;
        // The post-encode check passes; the check before removal does not.
        let prober = FakeProber::default()
            .with_duration(&source, 60.0)
            .with_duration(&destination, 60.2)
            .failing_after(&destination, 1);

        let result = processor(settings, prober)
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.progress, Some(100));
        let message = result.message.unwrap();
        assert!(message.starts_with("Encoded to"));
        assert!(!message.contains("(original removed)"));
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_skipped_encode_removes_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let destination = dir.path().join("film-chromecast.mp4");
        fs::write(&source, b"source").unwrap();
        fs::write(&destination, b"rendition").unwrap();
        let mut settings = settings("/nonexistent/ffmpeg");
        settings.remove_original_after_success = true;
        let prober = FakeProber::default()
            .with_duration(&source, 600.0)
            .with_duration(&destination, 600.0);

        let result = processor(settings, prober)
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert!(result
            .message
            .unwrap()
            .ends_with("skipping encode (original removed)"));
        assert!(!source.exists());
        assert!(destination.exists());
    }

    #[tokio::test]
    async fn test_removal_error_is_only_logged() {
        let dir = TempDir::new().unwrap();
        // A directory passes the source check but cannot be removed as a file.
        let source = dir.path().join("film.mkv");
        fs::create_dir(&source).unwrap();
        fs::write(dir.path().join("film-chromecast.mp4"), b"rendition").unwrap();
        let mut settings = settings("/nonexistent/ffmpeg");
        settings.remove_original_after_success = true;

        let result = processor(settings, FakeProber::default())
            .process(&job_for(&source), &RecordingReporter::default())
            .await;

        assert_eq!(result.status, JobStatus::Completed);
        assert!(result.message.unwrap().ends_with("skipping encode"));
        assert!(source.exists());
    }
}
