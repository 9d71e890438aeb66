//! Encoding modules

pub mod ffmpeg;

pub use ffmpeg::{
    build_ffmpeg_command, resolve_rate_control, run_ffmpeg, EncodeError, EncodeOutcome,
    FfmpegEncodeParams, RateControlPlan,
};
