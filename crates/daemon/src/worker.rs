//! GPU worker poll loop.

use crate::client::{Claim, CoordinatorClient};
use crate::jobs::{JobStatus, JobStatusUpdate};
use crate::processor::{JobError, JobProcessor, StatusReporter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause between finishing one job and claiming the next.
pub const POST_JOB_PAUSE: Duration = Duration::from_secs(1);

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A job was claimed and ended with this status.
    Processed(JobStatus),
    Idle,
    Paused,
    /// The coordinator could not be reached.
    Unreachable,
}

/// Claim at most one job and drive it to a terminal status.
pub async fn work_once(processor: &Arc<JobProcessor>, client: &Arc<CoordinatorClient>) -> Tick {
    let job = match client.claim_next().await {
        Ok(Claim::Job(job)) => job,
        Ok(Claim::Empty) => {
            debug!("No pending jobs");
            return Tick::Idle;
        }
        Ok(Claim::Paused { reason }) => {
            info!(reason = reason.as_deref().unwrap_or(""), "Queue paused; waiting");
            return Tick::Paused;
        }
        Err(e) => {
            warn!(coordinator = client.base_url(), error = %e, "Failed to claim job");
            return Tick::Unreachable;
        }
    };

    // Separate task so a panic inside the pipeline is contained to this job.
    let handle = tokio::spawn({
        let processor = Arc::clone(processor);
        let client = Arc::clone(client);
        let job = job.clone();
        async move { processor.process(&job, client.as_ref()).await }
    });

    match handle.await {
        Ok(update) => Tick::Processed(update.status),
        Err(e) => {
            error!(job_id = job.short_id(), error = %e, "Job task aborted");
            let message = JobError::Internal(format!("Worker task failed: {}", e)).to_string();
            client
                .report(
                    &job.id,
                    JobStatusUpdate::new(JobStatus::Failed, None, Some(message)),
                )
                .await;
            Tick::Processed(JobStatus::Failed)
        }
    }
}

/// Poll the coordinator forever.
///
/// Sleeps `poll_interval` whenever nothing was processed, and
/// [`POST_JOB_PAUSE`] after each job. Never returns.
pub async fn run_worker(
    processor: Arc<JobProcessor>,
    client: Arc<CoordinatorClient>,
    poll_interval: Duration,
) {
    info!(coordinator = client.base_url(), "Worker started");
    loop {
        match work_once(&processor, &client).await {
            Tick::Processed(_) => tokio::time::sleep(POST_JOB_PAUSE).await,
            Tick::Idle | Tick::Paused | Tick::Unreachable => {
                tokio::time::sleep(poll_interval).await
            }
        }
    }
}
