//! Clock and timing utilities for frame-ordered processing.
//!
//! A session measures wall time from the moment its first frame is
//! requested. Frame timestamps are derived from the frame index and the
//! stream's nominal frame rate, never from the processing clock.

use std::time::Instant;

/// Frame rate assumed when a stream reports none (or a non-positive one).
pub const FALLBACK_FPS: f64 = 30.0;

/// A processing clock that measures elapsed time since session start.
#[derive(Debug, Clone)]
pub struct ProcessingClock {
    /// The instant processing started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl ProcessingClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the clock started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Effective frame rate: `fps` when positive and finite, else [`FALLBACK_FPS`].
pub fn effective_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        FALLBACK_FPS
    }
}

/// Timestamp (seconds) of a zero-based frame index.
pub fn frame_timestamp(frame_index: u64, fps: f64) -> f64 {
    frame_index as f64 / effective_fps(fps)
}

/// Fires once every `every` frames, for progress logging.
#[derive(Debug, Clone, Copy)]
pub struct ProgressGate {
    every: u64,
}

impl ProgressGate {
    /// A gate firing every `every` frames; `0` never fires.
    pub fn new(every: u64) -> Self {
        Self { every }
    }

    /// Whether the given one-based frame count should be reported.
    pub fn should_report(&self, frames_processed: u64) -> bool {
        self.every > 0 && frames_processed > 0 && frames_processed % self.every == 0
    }
}
