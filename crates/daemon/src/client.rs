//! Worker-side client for the coordinator's claim protocol.

use crate::jobs::{Job, JobStatusUpdate};
use crate::processor::StatusReporter;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Error type for coordinator calls
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout or body decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The coordinator answered with a status the protocol does not use
    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(u16),
}

/// Result of asking for work.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    Job(Job),
    /// Nothing pending.
    Empty,
    /// Queue is paused.
    Paused { reason: Option<String> },
}

#[derive(Debug, Deserialize)]
struct PausedBody {
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client bound to one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    client: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// `GET /api/jobs/next`
    pub async fn claim_next(&self) -> Result<Claim, TransportError> {
        let response = self.client.get(self.url("/jobs/next")).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Claim::Job(response.json::<Job>().await?)),
            StatusCode::NO_CONTENT => Ok(Claim::Empty),
            StatusCode::CONFLICT => {
                let reason = response
                    .json::<PausedBody>()
                    .await
                    .ok()
                    .and_then(|body| body.reason);
                Ok(Claim::Paused { reason })
            }
            other => Err(TransportError::UnexpectedStatus(other.as_u16())),
        }
    }

    /// `POST /api/jobs/{id}/status`
    pub async fn report_status(
        &self,
        job_id: &str,
        update: &JobStatusUpdate,
    ) -> Result<Job, TransportError> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/status", job_id)))
            .json(update)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(response.json::<Job>().await?)
    }
}

impl StatusReporter for CoordinatorClient {
    async fn report(&self, job_id: &str, update: JobStatusUpdate) {
        if let Err(e) = self.report_status(job_id, &update).await {
            warn!(
                job_id,
                status = %update.status,
                error = %e,
                "Failed to report job status"
            );
        }
    }
}
