//! Job model shared by the coordinator and the workers.
//!
//! Jobs live in memory on the coordinator and travel to workers as JSON.

use castcode_config::EncodingProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be claimed.
    Pending,
    /// Job has been claimed by a worker.
    Running,
    /// Rendition produced (or already present).
    Completed,
    /// Job failed; see the message.
    Failed,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A conversion job for one source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Unique job identifier (UUID).
    pub id: String,
    /// Source media file.
    pub path: PathBuf,
    /// Library the source belongs to.
    pub library: String,
    /// Profile name the job was enqueued with.
    pub profile: String,
    /// Profile snapshot taken at enqueue time.
    #[serde(default)]
    pub encoding: Option<EncodingProfile>,
    pub status: JobStatus,
    /// 0..=100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: Option<String>,
    /// Unix timestamp (milliseconds) when job was created.
    pub created_at: i64,
    /// Unix timestamp (milliseconds) when job was last updated.
    pub updated_at: i64,
}

impl Job {
    /// Creates a new pending job with a fresh UUID.
    pub fn new(
        path: PathBuf,
        library: impl Into<String>,
        profile: impl Into<String>,
        encoding: Option<EncodingProfile>,
    ) -> Self {
        let now = current_timestamp_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            path,
            library: library.into(),
            profile: profile.into(),
            encoding,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the job's updated_at timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = current_timestamp_ms();
    }

    /// Merge a status report; progress and message only overwrite when present.
    pub fn apply(&mut self, update: &JobStatusUpdate) {
        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = &update.message {
            self.message = Some(message.clone());
        }
        self.touch();
    }

    /// Check if the job is in a terminal state (completed or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    /// First 8 characters of the id, for log lines.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Body of a status report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStatusUpdate {
    pub fn new(status: JobStatus, progress: Option<u8>, message: Option<String>) -> Self {
        Self {
            status,
            progress,
            message,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
pub(crate) fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
