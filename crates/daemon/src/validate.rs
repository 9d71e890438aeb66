//! Rendition validation.
//!
//! Used both before encoding (skip work that is already done) and after it
//! (gate success and source removal).

use crate::probe::MediaProber;
use std::path::Path;
use tracing::{debug, warn};

/// Largest accepted difference between source and rendition duration, in seconds.
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// True when `path` is an accessible, non-empty regular file.
pub fn output_present(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Check a rendition on disk.
///
/// With `expected_duration_secs <= 0` only presence is checked. Otherwise the
/// file is re-probed and must report a positive duration within
/// [`DURATION_TOLERANCE_SECS`] of the expected one.
pub fn validate_output(prober: &dyn MediaProber, path: &Path, expected_duration_secs: f64) -> bool {
    if !output_present(path) {
        debug!(path = %path.display(), "Output missing or empty");
        return false;
    }

    if expected_duration_secs <= 0.0 {
        return true;
    }

    let actual = match prober.probe(path) {
        Ok(analysis) => analysis.duration_secs,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unable to probe output duration");
            return false;
        }
    };

    if actual <= 0.0 {
        warn!(path = %path.display(), "Output reports no duration");
        return false;
    }

    let diff = (actual - expected_duration_secs).abs();
    if diff > DURATION_TOLERANCE_SECS {
        warn!(
            path = %path.display(),
            expected = expected_duration_secs,
            actual,
            "Output duration mismatch"
        );
        return false;
    }

    true
}
