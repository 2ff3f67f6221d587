//! Sample-accurate audio timestamp generation.
//!
//! Scaling each frame's duration independently and summing would accumulate
//! rounding error; the helper instead tracks a base timestamp plus a running
//! sample count and derives every timestamp from the total.

use streamkit_common::TimeDelta;

/// Generates presentation timestamps for a run of fixed-rate audio frames.
#[derive(Debug)]
pub(crate) struct AudioTimestampHelper {
    samples_per_second: u32,
    base_timestamp: Option<TimeDelta>,
    frame_count: u64,
}

impl AudioTimestampHelper {
    pub(crate) fn new(samples_per_second: u32) -> Self {
        AudioTimestampHelper {
            samples_per_second,
            base_timestamp: None,
            frame_count: 0,
        }
    }

    /// Seed the timeline. Resets the running frame count.
    pub(crate) fn set_base_timestamp(&mut self, base: TimeDelta) {
        self.base_timestamp = Some(base);
        self.frame_count = 0;
    }

    pub(crate) fn base_timestamp(&self) -> Option<TimeDelta> {
        self.base_timestamp
    }

    /// Timestamp of the next frame, or `None` while unseeded.
    pub(crate) fn timestamp(&self) -> Option<TimeDelta> {
        self.base_timestamp
            .map(|base| base + self.frames_to_delta(self.frame_count))
    }

    /// Duration of the next `frames` audio frames (PCM samples), computed as
    /// a difference of absolute offsets so consecutive frames tile the
    /// timeline exactly.
    pub(crate) fn frame_duration(&self, frames: u64) -> TimeDelta {
        self.frames_to_delta(self.frame_count + frames) - self.frames_to_delta(self.frame_count)
    }

    pub(crate) fn add_frames(&mut self, frames: u64) {
        debug_assert!(self.base_timestamp.is_some());
        self.frame_count += frames;
    }

    fn frames_to_delta(&self, frames: u64) -> TimeDelta {
        let micros = frames as i128 * 1_000_000 / self.samples_per_second as i128;
        TimeDelta::from_micros(micros as i64)
    }
}
