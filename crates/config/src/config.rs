//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Encoder rate-control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// High-quality variable bitrate (implies full-resolution multipass).
    #[default]
    VbrHq,
    /// Plain variable bitrate.
    Vbr,
    /// Constant bitrate.
    Cbr,
}

impl RateControl {
    /// Value passed to the encoder's `-rc` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateControl::VbrHq => "vbr_hq",
            RateControl::Vbr => "vbr",
            RateControl::Cbr => "cbr",
        }
    }
}

impl std::fmt::Display for RateControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio settings of an encoding profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioProfile {
    #[serde(default = "default_audio_codec")]
    pub codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub bitrate: String,
    #[serde(default = "default_audio_channels")]
    pub channels: u32,
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_audio_channels() -> u32 {
    2
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            codec: default_audio_codec(),
            bitrate: default_audio_bitrate(),
            channels: default_audio_channels(),
        }
    }
}

/// Named bundle of encode parameters applied to a library.
///
/// Jobs capture a copy of their profile at enqueue time, so edits to the
/// configuration never change a job that is already queued or running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodingProfile {
    #[serde(default = "default_codec")]
    pub codec: String,
    /// H.264 profile (baseline, main, high)
    #[serde(default = "default_h264_profile")]
    pub profile: String,
    #[serde(default = "default_level")]
    pub level: String,
    /// Resolution cap as WIDTHxHEIGHT
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "default_max_bitrate")]
    pub max_bitrate: String,
    #[serde(default = "default_bufsize")]
    pub bufsize: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_cq")]
    pub cq: u32,
    #[serde(default)]
    pub rc: RateControl,
    #[serde(default)]
    pub audio: AudioProfile,
}

fn default_codec() -> String {
    "h264".to_string()
}

fn default_h264_profile() -> String {
    "high".to_string()
}

fn default_level() -> String {
    "4.1".to_string()
}

fn default_resolution() -> String {
    "1920x1080".to_string()
}

fn default_max_fps() -> u32 {
    30
}

fn default_max_bitrate() -> String {
    "8M".to_string()
}

fn default_bufsize() -> String {
    "16M".to_string()
}

fn default_preset() -> String {
    "p5".to_string()
}

fn default_cq() -> u32 {
    18
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            profile: default_h264_profile(),
            level: default_level(),
            resolution: default_resolution(),
            max_fps: default_max_fps(),
            max_bitrate: default_max_bitrate(),
            bufsize: default_bufsize(),
            preset: default_preset(),
            cq: default_cq(),
            rc: RateControl::default(),
            audio: AudioProfile::default(),
        }
    }
}

/// A watched media library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// Root directory of the library
    pub root: PathBuf,
    /// Name of the encoding profile applied to this library
    pub profile: String,
}

/// Coordinator process configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorConfig {
    /// Listen address for the HTTP API
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enqueue the contents of every library at startup
    #[serde(default = "default_scan_on_startup")]
    pub scan_on_startup: bool,
}

fn default_bind() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_scan_on_startup() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            scan_on_startup: default_scan_on_startup(),
        }
    }
}

/// GPU worker process configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Base URL of the coordinator
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,
    /// Seconds to sleep when no job could be claimed
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-request timeout for coordinator calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Kill an encode after this many seconds (0 = unlimited)
    #[serde(default)]
    pub max_encode_runtime_secs: u64,
}

fn default_coordinator_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator_url: default_coordinator_url(),
            poll_interval_secs: default_poll_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            max_encode_runtime_secs: 0,
        }
    }
}

/// External toolchain binaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Operational switches
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OperationalConfig {
    /// Delete the source once its rendition has been validated
    #[serde(default)]
    pub remove_original_after_success: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub operational: OperationalConfig,
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryConfig>,
    #[serde(default)]
    pub profiles: BTreeMap<String, EncodingProfile>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - COORDINATOR_BIND -> coordinator.bind
    /// - COORDINATOR_URL -> worker.coordinator_url
    /// - WORKER_POLL_INTERVAL -> worker.poll_interval_secs
    /// - WORKER_HTTP_TIMEOUT -> worker.http_timeout_secs
    /// - MAX_ENCODE_RUNTIME -> worker.max_encode_runtime_secs
    /// - FFMPEG_PATH / FFPROBE_PATH -> tools.ffmpeg / tools.ffprobe
    /// - REMOVE_ORIGINAL_AFTER_SUCCESS -> operational.remove_original_after_success
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("COORDINATOR_BIND") {
            if !val.trim().is_empty() {
                self.coordinator.bind = val;
            }
        }

        if let Ok(val) = env::var("COORDINATOR_URL") {
            if !val.trim().is_empty() {
                self.worker.coordinator_url = val;
            }
        }

        if let Ok(val) = env::var("WORKER_POLL_INTERVAL") {
            if let Ok(secs) = val.parse::<u64>() {
                self.worker.poll_interval_secs = secs;
            }
        }

        if let Ok(val) = env::var("WORKER_HTTP_TIMEOUT") {
            if let Ok(secs) = val.parse::<u64>() {
                self.worker.http_timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("MAX_ENCODE_RUNTIME") {
            if let Ok(secs) = val.parse::<u64>() {
                self.worker.max_encode_runtime_secs = secs;
            }
        }

        if let Ok(val) = env::var("FFMPEG_PATH") {
            if !val.trim().is_empty() {
                self.tools.ffmpeg = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("FFPROBE_PATH") {
            if !val.trim().is_empty() {
                self.tools.ffprobe = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("REMOVE_ORIGINAL_AFTER_SUCCESS") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.operational.remove_original_after_success = true,
                "false" | "0" | "no" => self.operational.remove_original_after_success = false,
                _ => {} // Invalid value, keep existing
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields defaults (plus env overrides)
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Ok(mut config) => {
                config.apply_env_overrides();
                Ok(config)
            }
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                let mut config = Config::default();
                config.apply_env_overrides();
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up an encoding profile by name
    pub fn profile_named(&self, name: &str) -> Option<&EncodingProfile> {
        self.profiles.get(name)
    }

    /// Find the library whose root contains `path`.
    ///
    /// Nested roots resolve to the most specific (longest) root.
    pub fn library_for_path(&self, path: &Path) -> Option<(&str, &LibraryConfig)> {
        self.libraries
            .iter()
            .filter(|(_, library)| path.starts_with(&library.root))
            .max_by_key(|(_, library)| library.root.components().count())
            .map(|(name, library)| (name.as_str(), library))
    }
}
