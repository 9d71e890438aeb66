//! Coordinator metrics
//!
//! Job counts are derived from the queue on demand; host load is sampled by a
//! background task into [`SharedSystemMetrics`].

use crate::jobs::{current_timestamp_ms, Job, JobStatus};
use crate::queue::JobQueue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::RwLock;

/// Number of jobs per status
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

/// System-level metrics for resource monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub mem_usage_percent: f32,
    pub load_avg_1: f32,
    pub load_avg_5: f32,
    pub load_avg_15: f32,
}

/// Body of `GET /api/metrics`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub timestamp_unix_ms: i64,
    pub jobs: JobCounts,
    /// Jobs waiting to be claimed.
    pub queue_len: usize,
    pub paused: bool,
    pub system: SystemMetrics,
}

/// Latest host sample, shared between the updater task and the API.
pub type SharedSystemMetrics = Arc<RwLock<SystemMetrics>>;

pub fn new_shared_system_metrics() -> SharedSystemMetrics {
    Arc::new(RwLock::new(SystemMetrics::default()))
}

pub fn count_jobs(jobs: &[Job]) -> JobCounts {
    let mut counts = JobCounts::default();
    for job in jobs {
        match job.status {
            JobStatus::Pending => counts.pending += 1,
            JobStatus::Running => counts.running += 1,
            JobStatus::Completed => counts.completed += 1,
            JobStatus::Failed => counts.failed += 1,
        }
    }
    counts
}

/// Assemble a snapshot from the queue and the last host sample.
pub async fn snapshot(queue: &JobQueue, system: &SharedSystemMetrics) -> MetricsSnapshot {
    let jobs = count_jobs(&queue.list_jobs().await);
    let paused = queue.queue_state().await.paused;
    MetricsSnapshot {
        timestamp_unix_ms: current_timestamp_ms(),
        queue_len: jobs.pending,
        jobs,
        paused,
        system: system.read().await.clone(),
    }
}

/// Refresh `sys` and read current system metrics from it
///
/// CPU usage is the delta since the previous refresh of the same `System`, so
/// callers keep one instance alive between samples; the first sample reads 0.
pub fn collect_system_metrics(sys: &mut System) -> SystemMetrics {
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let total_memory = sys.total_memory();
    let mem_usage = if total_memory > 0 {
        (sys.used_memory() as f64 / total_memory as f64 * 100.0) as f32
    } else {
        0.0
    };

    let load_avg = System::load_average();

    SystemMetrics {
        cpu_usage_percent: sys.global_cpu_usage(),
        mem_usage_percent: mem_usage,
        load_avg_1: load_avg.one as f32,
        load_avg_5: load_avg.five as f32,
        load_avg_15: load_avg.fifteen as f32,
    }
}
