//! castcode
//!
//! Job coordinator and GPU encode workers producing Chromecast-compatible
//! H.264 renditions of a media library.

pub mod capability;
pub mod client;
pub mod coordinator;
pub mod encode;
pub mod jobs;
pub mod metrics;
pub mod naming;
pub mod probe;
pub mod processor;
pub mod profiles;
pub mod progress;
pub mod queue;
pub mod scan;
pub mod server;
pub mod startup;
pub mod streams;
pub mod validate;
pub mod worker;

pub use castcode_config as config;
pub use castcode_config::Config;
pub use capability::{probe_capabilities, CapabilitySet, HostEnvironment};
pub use client::{Claim, CoordinatorClient, TransportError};
pub use coordinator::{Coordinator, CoordinatorError};
pub use encode::{build_ffmpeg_command, run_ffmpeg, EncodeError, EncodeOutcome, FfmpegEncodeParams};
pub use jobs::{Job, JobStatus, JobStatusUpdate};
pub use metrics::{collect_system_metrics, JobCounts, MetricsSnapshot, SystemMetrics};
pub use probe::{Ffprobe, MediaAnalysis, MediaProber, ProbeError};
pub use processor::{JobError, JobProcessor, ProcessorSettings, StatusReporter};
pub use profiles::{ProfileError, ProfileStore};
pub use progress::{DiagnosticTail, ProgressMonitor, ProgressUpdate};
pub use queue::{JobQueue, QueueError, QueueState};
pub use server::{create_router, run_server, AppState, ServerError};
pub use startup::{run_startup_checks, StartupError};
pub use streams::{select_streams, StreamDescriptor, StreamKind, StreamSelection};
pub use worker::{run_worker, work_once, Tick};
