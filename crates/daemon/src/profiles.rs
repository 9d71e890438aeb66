//! Encoding profiles served by the coordinator
//!
//! Seeded from the config file and editable at runtime through the API. Edits
//! live in memory only. A queued job keeps the snapshot taken at enqueue time.

use castcode_config::EncodingProfile;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Highest frame-rate cap a profile may ask for.
pub const MAX_PROFILE_FPS: u32 = 30;

/// Highest constant-quality value a profile may ask for.
pub const MAX_PROFILE_CQ: u32 = 30;

/// Rejected profile edit
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("Profile name must not be empty")]
    EmptyName,

    #[error("max_fps must be between 1 and 30, got {0}")]
    FrameRate(u32),

    #[error("cq must be at most 30, got {0}")]
    Quality(u32),
}

/// Check the bounds a rendition profile must respect.
pub fn check_profile(name: &str, profile: &EncodingProfile) -> Result<(), ProfileError> {
    if name.trim().is_empty() {
        return Err(ProfileError::EmptyName);
    }
    if profile.max_fps == 0 || profile.max_fps > MAX_PROFILE_FPS {
        return Err(ProfileError::FrameRate(profile.max_fps));
    }
    if profile.cq > MAX_PROFILE_CQ {
        return Err(ProfileError::Quality(profile.cq));
    }
    Ok(())
}

/// Live profile table
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: RwLock<BTreeMap<String, EncodingProfile>>,
}

impl ProfileStore {
    pub fn new(profiles: BTreeMap<String, EncodingProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles),
        }
    }

    pub async fn get(&self, name: &str) -> Option<EncodingProfile> {
        self.profiles.read().await.get(name).cloned()
    }

    pub async fn all(&self) -> BTreeMap<String, EncodingProfile> {
        self.profiles.read().await.clone()
    }

    /// Create or replace profile `name`.
    pub async fn upsert(
        &self,
        name: &str,
        profile: EncodingProfile,
    ) -> Result<EncodingProfile, ProfileError> {
        check_profile(name, &profile)?;
        let replaced = self
            .profiles
            .write()
            .await
            .insert(name.to_string(), profile.clone())
            .is_some();
        info!(profile = name, replaced, "Encoding profile updated");
        Ok(profile)
    }
}
