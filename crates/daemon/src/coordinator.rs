//! Coordinator process
//!
//! Owns the job queue, runs the startup scan and the system metrics updater,
//! and serves the HTTP API.

use crate::metrics::{collect_system_metrics, new_shared_system_metrics, SharedSystemMetrics};
use crate::profiles::ProfileStore;
use crate::queue::JobQueue;
use crate::scan::{enqueue_library, ScanSummary};
use crate::server::{run_server, AppState, ServerError};
use castcode_config::Config;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use thiserror::Error;
use tracing::{info, warn};

/// Interval between system metric samples.
const METRICS_INTERVAL: Duration = Duration::from_secs(2);

/// Error type for coordinator operations
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// The coordinator and its shared state
pub struct Coordinator {
    config: Arc<Config>,
    queue: Arc<JobQueue>,
    profiles: Arc<ProfileStore>,
    system: SharedSystemMetrics,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self {
            profiles: Arc::new(ProfileStore::new(config.profiles.clone())),
            config: Arc::new(config),
            queue: Arc::new(JobQueue::new()),
            system: new_shared_system_metrics(),
        }
    }

    pub fn queue(&self) -> Arc<JobQueue> {
        Arc::clone(&self.queue)
    }

    /// Handler state for the API router
    pub fn state(&self) -> AppState {
        AppState {
            queue: Arc::clone(&self.queue),
            config: Arc::clone(&self.config),
            profiles: Arc::clone(&self.profiles),
            system: self.system.clone(),
        }
    }

    /// Enqueue the contents of every configured library.
    pub async fn scan_all(&self) -> Vec<(String, ScanSummary)> {
        let mut results = Vec::new();
        for (name, library) in &self.config.libraries {
            let profile = self.profiles.get(&library.profile).await;
            let summary = enqueue_library(&self.queue, name, library, profile.as_ref()).await;
            results.push((name.clone(), summary));
        }
        results
    }

    /// Start the metrics update task
    ///
    /// Periodically samples host load into the shared state. One `System` is
    /// carried across ticks so CPU usage has a previous sample to diff against.
    pub fn start_metrics_updater(&self) -> tokio::task::JoinHandle<()> {
        let system = self.system.clone();
        tokio::spawn(async move {
            let mut sampler = System::new();
            loop {
                let sampled = tokio::task::spawn_blocking(move || {
                    let sample = collect_system_metrics(&mut sampler);
                    (sampler, sample)
                })
                .await;
                match sampled {
                    Ok((returned, sample)) => {
                        sampler = returned;
                        *system.write().await = sample;
                    }
                    Err(e) => {
                        warn!(error = %e, "System metrics sampling failed");
                        sampler = System::new();
                    }
                }
                tokio::time::sleep(METRICS_INTERVAL).await;
            }
        })
    }

    /// Run the coordinator with all background tasks
    ///
    /// Binds the API address, schedules the startup scan, starts the metrics
    /// updater and serves until the server fails.
    pub async fn run(self) -> Result<(), CoordinatorError> {
        let addr = self.config.coordinator.bind.clone();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| CoordinatorError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(addr = %addr, libraries = self.config.libraries.len(), "Coordinator listening");

        let coordinator = Arc::new(self);

        if coordinator.config.coordinator.scan_on_startup {
            let scanner = Arc::clone(&coordinator);
            tokio::spawn(async move {
                scanner.scan_all().await;
            });
        }

        let _updater_handle = coordinator.start_metrics_updater();

        run_server(listener, coordinator.state()).await?;
        Ok(())
    }
}
