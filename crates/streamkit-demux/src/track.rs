//! Per-track buffering state machine.
//!
//! A `Track` accumulates parsed buffers for one logical stream. Buffers whose
//! duration is not yet known are held back in a single optional slot until
//! the next buffer's timestamp (or the end of the segment) resolves it; only
//! buffers below the demuxer's shared ready window are released.

use crate::buffer::StreamBuffer;
use crate::error::{Error, Result};
use crate::metrics::MetricsSink;
use std::collections::VecDeque;
use streamkit_common::{TimeDelta, TrackType};

/// Fallback duration for a trailing audio buffer with no observed estimate.
pub const DEFAULT_AUDIO_BUFFER_DURATION: TimeDelta = TimeDelta::from_millis(23);

/// Fallback duration for a trailing video buffer with no observed estimate.
pub const DEFAULT_VIDEO_BUFFER_DURATION: TimeDelta = TimeDelta::from_millis(42);

/// Buffering state for one logical stream.
#[derive(Debug)]
pub struct Track {
    track_num: u64,
    track_type: TrackType,
    default_duration: Option<TimeDelta>,
    pending: VecDeque<StreamBuffer>,
    ready: Vec<StreamBuffer>,
    held_back: Option<StreamBuffer>,
    /// Minimum non-zero duration observed since the last full
    /// reconfiguration. Survives `reset`.
    estimated_duration: Option<TimeDelta>,
    last_added_dts: Option<TimeDelta>,
}

impl Track {
    /// Create a track for the given stream.
    pub fn new(track_num: u64, track_type: TrackType, default_duration: Option<TimeDelta>) -> Self {
        Track {
            track_num,
            track_type,
            default_duration,
            pending: VecDeque::new(),
            ready: Vec::new(),
            held_back: None,
            estimated_duration: None,
            last_added_dts: None,
        }
    }

    /// Container track number.
    pub fn track_num(&self) -> u64 {
        self.track_num
    }

    /// Logical stream kind.
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Configured per-track default buffer duration, if any.
    pub fn default_duration(&self) -> Option<TimeDelta> {
        self.default_duration
    }

    /// Buffers released below the current ready window, in decode order.
    pub fn ready(&self) -> &[StreamBuffer] {
        &self.ready
    }

    /// Accept the next parsed buffer for this track.
    ///
    /// A buffer with unknown duration is held back rather than queued; the
    /// next buffer's timestamp finalizes it. A resolved negative duration or
    /// a decode-timestamp regression is a fatal defect.
    pub fn add_buffer(&mut self, buf: StreamBuffer) -> Result<()> {
        let dts = buf.decode_timestamp();
        if let Some(last) = self.last_added_dts {
            if dts < last {
                return Err(Error::TimestampRegression {
                    track_num: self.track_num,
                    previous: last,
                    current: dts,
                });
            }
        }
        self.last_added_dts = Some(dts);

        if let Some(mut held) = self.held_back.take() {
            let derived = buf.timestamp() - held.timestamp();
            held.set_duration(Some(derived));
            self.queue_buffer(held)?;
        }

        if buf.duration().is_none() {
            self.held_back = Some(buf);
            return Ok(());
        }

        self.queue_buffer(buf)
    }

    /// Flush the held-back buffer at end of segment, assigning the running
    /// duration estimate or a fixed per-type default.
    ///
    /// Estimated durations never feed the estimate itself; it derives only
    /// from observed durations.
    pub fn apply_duration_estimate_if_needed(&mut self, metrics: &mut dyn MetricsSink) {
        let Some(mut held) = self.held_back.take() else {
            return;
        };

        let estimate = self.estimated_duration.unwrap_or(match self.track_type {
            TrackType::Video => DEFAULT_VIDEO_BUFFER_DURATION,
            _ => DEFAULT_AUDIO_BUFFER_DURATION,
        });
        tracing::warn!(
            track_num = self.track_num,
            %estimate,
            "estimating duration of trailing buffer at {}",
            held.timestamp()
        );
        metrics.duration_estimated(self.track_type, estimate);

        // Ordering was validated when the buffer was added and the estimate
        // is always positive, so this cannot fail. The estimate is not fed
        // back into itself.
        held.set_duration(Some(estimate));
        self.pending.push_back(held);
    }

    /// Move the longest prefix of pending buffers with decode timestamp
    /// strictly below `before` into the ready queue, preserving order.
    pub fn extract_ready_buffers(&mut self, before: TimeDelta) {
        debug_assert!(self.ready.is_empty());
        debug_assert!(!before.is_negative());

        while let Some(front) = self.pending.front() {
            if front.decode_timestamp() >= before {
                break;
            }
            // Unwrap is fine: front() just confirmed the queue is non-empty.
            self.ready.push(self.pending.pop_front().unwrap());
        }
    }

    /// Upper bound below which this track's buffers are safely orderable.
    ///
    /// While a buffer is held back, anything at or after its decode
    /// timestamp cannot yet be ordered against it. Track kinds that do not
    /// participate in the cross-track window never impose a bound.
    pub fn ready_upper_bound(&self) -> TimeDelta {
        if !self.track_type.bounds_ready_window() {
            return TimeDelta::MAX;
        }
        match &self.held_back {
            Some(held) => held.decode_timestamp(),
            None => TimeDelta::MAX,
        }
    }

    /// Drop released buffers at the start of a new parse/reset cycle.
    pub fn clear_ready(&mut self) {
        self.ready.clear();
    }

    /// Clear per-cluster state. The duration estimate survives; it is reset
    /// only by a full metadata reconfiguration (a new `Track`).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.held_back = None;
        self.last_added_dts = None;
    }

    fn queue_buffer(&mut self, buf: StreamBuffer) -> Result<()> {
        let duration = buf
            .duration()
            .ok_or_else(|| Error::invalid_block("queued buffer has unknown duration"))?;
        if duration.is_negative() {
            return Err(Error::InvalidDuration {
                track_num: self.track_num,
                duration,
            });
        }

        if !duration.is_zero() {
            self.estimated_duration = Some(match self.estimated_duration {
                Some(current) => current.min(duration),
                None => duration,
            });
        }

        self.pending.push_back(buf);
        Ok(())
    }
}
