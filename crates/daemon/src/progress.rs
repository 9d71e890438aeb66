//! Encoder progress tracking.
//!
//! ffmpeg writes `key=value` blocks to its `-progress` channel. [`ProgressMonitor`]
//! turns the elapsed-time keys into throttled percentage updates, and
//! [`DiagnosticTail`] keeps the last lines of human-readable output for failure
//! messages.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Progress reported when a worker picks a job up.
pub const ALLOCATED_PROGRESS: u8 = 5;

/// Minimum wall-clock spacing between two emitted updates.
pub const MIN_EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Nominal encode length assumed when the source duration is unknown.
pub const HEURISTIC_CEILING_SECS: f64 = 20.0 * 60.0;

/// Elapsed encode seconds between two heuristic steps.
pub const HEURISTIC_STEP_SECS: f64 = 5.0;

/// Largest advance of one heuristic step, in percentage points.
pub const HEURISTIC_MAX_STEP: u8 = 2;

/// Number of diagnostic lines kept for failure messages.
pub const DIAGNOSTIC_TAIL_LINES: usize = 100;

/// One line of the progress channel, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// Encoded media time, in seconds.
    Elapsed(f64),
    /// `progress=end`: the stream is finished.
    End,
    /// Any other key, or not a `key=value` line.
    Other,
}

/// Classify one progress-channel line.
///
/// `out_time_us` and `out_time_ms` both carry microseconds (ffmpeg's `_ms` key is
/// misnamed); `out_time` carries an `HH:MM:SS.ffffff` timecode.
pub fn parse_progress_line(line: &str) -> ProgressLine {
    let Some((key, value)) = line.trim().split_once('=') else {
        return ProgressLine::Other;
    };
    let value = value.trim();

    match key.trim() {
        "out_time_us" | "out_time_ms" => value
            .parse::<i64>()
            .ok()
            .filter(|us| *us >= 0)
            .map(|us| ProgressLine::Elapsed(us as f64 / 1_000_000.0))
            .unwrap_or(ProgressLine::Other),
        "out_time" => parse_timecode(value)
            .map(ProgressLine::Elapsed)
            .unwrap_or(ProgressLine::Other),
        "progress" if value == "end" => ProgressLine::End,
        _ => ProgressLine::Other,
    }
}

/// Parse `HH:MM:SS[.fraction]` into seconds.
pub fn parse_timecode(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours = parts.next()?.parse::<u64>().ok()?;
    let minutes = parts.next()?.parse::<u64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// A status update to forward to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

/// Throttled percentage tracker for one encode.
///
/// Updates are emitted only when the percentage grows and at least
/// [`MIN_EMIT_INTERVAL`] has passed since the previous one, so the reported
/// progress of a job never decreases.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    duration_secs: f64,
    last_percent: u8,
    last_emit: Instant,
    heuristic_percent: u8,
    last_step_elapsed: f64,
    finished: bool,
}

impl ProgressMonitor {
    /// `duration_secs <= 0` switches to the heuristic estimate.
    pub fn new(duration_secs: f64, started: Instant) -> Self {
        Self {
            duration_secs,
            last_percent: ALLOCATED_PROGRESS,
            last_emit: started,
            heuristic_percent: 0,
            last_step_elapsed: 0.0,
            finished: false,
        }
    }

    /// Last percentage emitted (or the allocation baseline).
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one progress-channel line observed at `now`.
    pub fn observe(&mut self, line: &str, now: Instant) -> Option<ProgressUpdate> {
        if self.finished {
            return None;
        }
        match parse_progress_line(line) {
            ProgressLine::Elapsed(elapsed) => self.observe_elapsed(elapsed, now),
            ProgressLine::End => {
                self.finished = true;
                self.last_percent = 100;
                self.last_emit = now;
                Some(ProgressUpdate {
                    percent: 100,
                    message: "Encoding finished".to_string(),
                })
            }
            ProgressLine::Other => None,
        }
    }

    fn observe_elapsed(&mut self, elapsed: f64, now: Instant) -> Option<ProgressUpdate> {
        let (percent, message) = if self.duration_secs > 0.0 {
            let percent = (elapsed / self.duration_secs * 100.0).floor().clamp(0.0, 99.0) as u8;
            (percent, format!("Encoded {:.1}s", elapsed))
        } else {
            self.advance_heuristic(elapsed);
            let remaining = (HEURISTIC_CEILING_SECS - elapsed).max(0.0);
            (
                self.heuristic_percent,
                format!(
                    "Encoded {:.1}s (~{} remaining, estimated)",
                    elapsed,
                    format_remaining(remaining)
                ),
            )
        };

        if percent <= self.last_percent
            || now.saturating_duration_since(self.last_emit) < MIN_EMIT_INTERVAL
        {
            return None;
        }

        self.last_percent = percent;
        self.last_emit = now;
        Some(ProgressUpdate { percent, message })
    }

    fn advance_heuristic(&mut self, elapsed: f64) {
        if elapsed - self.last_step_elapsed < HEURISTIC_STEP_SECS {
            return;
        }
        self.last_step_elapsed = elapsed;
        let target = (elapsed / HEURISTIC_CEILING_SECS * 100.0).floor().clamp(0.0, 99.0) as u8;
        let stepped = self
            .heuristic_percent
            .saturating_add(HEURISTIC_MAX_STEP)
            .min(target);
        if stepped > self.heuristic_percent {
            self.heuristic_percent = stepped;
        }
    }
}

fn format_remaining(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}m {:02}s", total / 60, total % 60)
}

/// Bounded buffer of the most recent diagnostic lines.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for DiagnosticTail {
    fn default() -> Self {
        Self::with_capacity(DIAGNOSTIC_TAIL_LINES)
    }
}

impl DiagnosticTail {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, dropping the oldest one when full. Blank lines are ignored.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}
