//! In-memory job queue with an exclusive claim and a pause gate.
//!
//! Every mutation goes through one mutex, which is what makes `claim_next`
//! exclusive across any number of concurrent workers.

use crate::jobs::{Job, JobStatus, JobStatusUpdate};
use crate::naming::{is_media_file, is_rendition, rendition_path};
use crate::validate::output_present;
use castcode_config::EncodingProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Error type for queue operations
#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    /// Rejected job parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown job id
    #[error("Job not found: {0}")]
    NotFound(String),
}

/// Snapshot of the pause gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub paused: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct QueueInner {
    /// Insertion order is claim order.
    jobs: Vec<Job>,
    state: QueueState,
}

/// The coordinator's job store.
#[derive(Debug, Default)]
pub struct JobQueue {
    inner: Mutex<QueueInner>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job for `path`, or return the live job already tracking it.
    ///
    /// # Errors
    /// `InvalidInput` when the path is not a media file, is itself a rendition,
    /// or already has a non-empty rendition on disk.
    pub async fn enqueue(
        &self,
        path: PathBuf,
        library: &str,
        profile: &str,
        encoding: Option<EncodingProfile>,
    ) -> Result<Job, QueueError> {
        if !is_media_file(&path) {
            return Err(QueueError::InvalidInput(format!(
                "Unsupported file type: {}",
                path.display()
            )));
        }
        if is_rendition(&path) {
            return Err(QueueError::InvalidInput(format!(
                "Path is already a converted rendition: {}",
                path.display()
            )));
        }

        // Filesystem check first; the lock is never held across disk I/O.
        let existing_rendition = rendition_on_disk(&path).await;

        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner
            .jobs
            .iter()
            .find(|job| job.path == path && job.status != JobStatus::Failed)
        {
            debug!(job_id = existing.short_id(), path = %path.display(), "Job already queued");
            return Ok(existing.clone());
        }

        if let Some(destination) = existing_rendition {
            return Err(QueueError::InvalidInput(format!(
                "Rendition already exists: {}",
                destination.display()
            )));
        }

        let job = Job::new(path, library, profile, encoding);
        info!(
            job_id = job.short_id(),
            path = %job.path.display(),
            library,
            profile,
            "Job enqueued"
        );
        inner.jobs.push(job.clone());
        Ok(job)
    }

    /// Claim the oldest pending job, marking it running.
    ///
    /// Returns `None` when paused or when nothing is pending.
    pub async fn claim_next(&self) -> Option<Job> {
        let mut inner = self.inner.lock().await;
        if inner.state.paused {
            return None;
        }

        let job = inner
            .jobs
            .iter_mut()
            .find(|job| job.status == JobStatus::Pending)?;
        job.status = JobStatus::Running;
        job.touch();
        info!(job_id = job.short_id(), path = %job.path.display(), "Job claimed");
        Some(job.clone())
    }

    /// Merge a status report into job `id`.
    pub async fn report_status(&self, id: &str, update: &JobStatusUpdate) -> Result<Job, QueueError> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        job.apply(update);
        if job.is_terminal() {
            info!(
                job_id = job.short_id(),
                status = %job.status,
                message = job.message.as_deref().unwrap_or(""),
                "Job finished"
            );
        } else {
            debug!(job_id = job.short_id(), status = %job.status, progress = job.progress, "Job progress");
        }
        Ok(job.clone())
    }

    /// Stop handing out jobs. Running jobs are unaffected.
    pub async fn pause(&self, reason: Option<String>) -> QueueState {
        let mut inner = self.inner.lock().await;
        inner.state = QueueState {
            paused: true,
            reason,
        };
        info!(reason = inner.state.reason.as_deref().unwrap_or(""), "Queue paused");
        inner.state.clone()
    }

    pub async fn resume(&self) -> QueueState {
        let mut inner = self.inner.lock().await;
        inner.state = QueueState::default();
        info!("Queue resumed");
        inner.state.clone()
    }

    pub async fn queue_state(&self) -> QueueState {
        self.inner.lock().await.state.clone()
    }

    /// All jobs in insertion order.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.inner.lock().await.jobs.clone()
    }

}

/// The rendition path for `source` when a non-empty rendition already exists.
async fn rendition_on_disk(source: &Path) -> Option<PathBuf> {
    let destination = rendition_path(source);
    tokio::task::spawn_blocking(move || output_present(&destination).then_some(destination))
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn enqueue(queue: &JobQueue, path: &str) -> Job {
        queue
            .enqueue(PathBuf::from(path), "movies", "chromecast", None)
            .await
            .expect("enqueue should succeed")
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent_per_path() {
        let queue = JobQueue::new();
        let first = enqueue(&queue, "/media/movies/a.mkv").await;
        let second = enqueue(&queue, "/media/movies/a.mkv").await;

        assert_eq!(first.id, second.id);
        assert_eq!(queue.list_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_job_can_be_requeued() {
        let queue = JobQueue::new();
        let first = enqueue(&queue, "/media/movies/a.mkv").await;
        queue
            .report_status(&first.id, &JobStatusUpdate::new(JobStatus::Failed, None, None))
            .await
            .unwrap();

        let second = enqueue(&queue, "/media/movies/a.mkv").await;

        assert_ne!(first.id, second.id);
        assert_eq!(second.status, JobStatus::Pending);
        assert_eq!(queue.list_jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_rejections() {
        let queue = JobQueue::new();

        let err = queue
            .enqueue(PathBuf::from("/media/notes.txt"), "movies", "chromecast", None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(_)));

        let err = queue
            .enqueue(PathBuf::from("/media/a-chromecast.mp4"), "movies", "chromecast", None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(_)));

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        fs::write(dir.path().join("film-chromecast.mp4"), b"rendition").unwrap();
        let err = queue
            .enqueue(source, "movies", "chromecast", None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(msg) if msg.contains("already exists")));

        assert!(queue.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_rendition_does_not_block_enqueue() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("film-chromecast.mp4"), b"").unwrap();
        let queue = JobQueue::new();

        let job = queue
            .enqueue(dir.path().join("film.mkv"), "movies", "chromecast", None)
            .await;
        assert!(job.is_ok());
    }

    #[tokio::test]
    async fn test_rendition_on_disk() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let rendition = dir.path().join("film-chromecast.mp4");

        assert_eq!(rendition_on_disk(&source).await, None);
        fs::write(&rendition, b"").unwrap();
        assert_eq!(rendition_on_disk(&source).await, None);
        fs::write(&rendition, b"rendition").unwrap();
        assert_eq!(rendition_on_disk(&source).await, Some(rendition));
    }

    #[tokio::test]
    async fn test_live_job_wins_over_new_rendition() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("film.mkv");
        let queue = JobQueue::new();
        let first = queue
            .enqueue(source.clone(), "movies", "chromecast", None)
            .await
            .unwrap();
        fs::write(dir.path().join("film-chromecast.mp4"), b"rendition").unwrap();

        let again = queue
            .enqueue(source, "movies", "chromecast", None)
            .await
            .unwrap();

        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_claim_in_insertion_order() {
        let queue = JobQueue::new();
        let a = enqueue(&queue, "/media/a.mkv").await;
        let b = enqueue(&queue, "/media/b.mkv").await;

        let first = queue.claim_next().await.unwrap();
        let second = queue.claim_next().await.unwrap();

        assert_eq!(first.id, a.id);
        assert_eq!(first.status, JobStatus::Running);
        assert_eq!(second.id, b.id);
        assert!(queue.claim_next().await.is_none());
    }

    #[tokio::test]
    async fn test_report_status_merges_fields() {
        let queue = JobQueue::new();
        let job = enqueue(&queue, "/media/a.mkv").await;

        queue
            .report_status(
                &job.id,
                &JobStatusUpdate::new(JobStatus::Running, Some(30), Some("Encoding".into())),
            )
            .await
            .unwrap();
        let updated = queue
            .report_status(&job.id, &JobStatusUpdate::new(JobStatus::Completed, None, None))
            .await
            .unwrap();

        assert_eq!(updated.status, JobStatus::Completed);
        assert_eq!(updated.progress, 30);
        assert_eq!(updated.message.as_deref(), Some("Encoding"));
        assert_eq!(queue.list_jobs().await, vec![updated]);
    }

    #[tokio::test]
    async fn test_report_unknown_id() {
        let queue = JobQueue::new();
        let err = queue
            .report_status("nope", &JobStatusUpdate::new(JobStatus::Running, None, None))
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_pause_blocks_claims_until_resume() {
        let queue = JobQueue::new();
        let running = enqueue(&queue, "/media/a.mkv").await;
        enqueue(&queue, "/media/b.mkv").await;
        queue.claim_next().await.unwrap();

        let state = queue.pause(Some("maintenance".to_string())).await;
        assert!(state.paused);
        assert_eq!(state.reason.as_deref(), Some("maintenance"));

        for _ in 0..3 {
            assert!(queue.claim_next().await.is_none());
        }

        // Running jobs keep reporting while paused.
        let updated = queue
            .report_status(&running.id, &JobStatusUpdate::new(JobStatus::Running, Some(60), None))
            .await
            .unwrap();
        assert_eq!(updated.progress, 60);

        let state = queue.resume().await;
        assert_eq!(state, QueueState::default());
        assert!(queue.claim_next().await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_are_exclusive() {
        let queue = Arc::new(JobQueue::new());
        for i in 0..50 {
            enqueue(&queue, &format!("/media/{i}.mkv")).await;
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = queue.claim_next().await {
                    claimed.push(job.id);
                    tokio::task::yield_now().await;
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();

        assert_eq!(all.len(), 50);
        assert_eq!(unique.len(), 50);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        // N pending jobs and M workers: every job is claimed exactly once.
        #[test]
        fn prop_each_job_claimed_exactly_once(jobs in 0usize..40, workers in 1usize..8) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .build()
                .unwrap();

            let (claimed, expected) = rt.block_on(async {
                let queue = Arc::new(JobQueue::new());
                let mut expected = HashSet::new();
                for i in 0..jobs {
                    let job = queue
                        .enqueue(Path::new("/lib").join(format!("{i}.mp4")), "lib", "p", None)
                        .await
                        .unwrap();
                    expected.insert(job.id);
                }

                let tasks: Vec<_> = (0..workers)
                    .map(|_| {
                        let queue = Arc::clone(&queue);
                        tokio::spawn(async move {
                            let mut mine = Vec::new();
                            while let Some(job) = queue.claim_next().await {
                                mine.push(job.id);
                            }
                            mine
                        })
                    })
                    .collect();

                let mut claimed = Vec::new();
                for task in tasks {
                    claimed.extend(task.await.unwrap());
                }
                (claimed, expected)
            });

            let unique: HashSet<_> = claimed.iter().cloned().collect();
            prop_assert_eq!(claimed.len(), jobs);
            prop_assert_eq!(unique, expected);
        }
    }
}
