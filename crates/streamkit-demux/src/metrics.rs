//! Metrics-collector seam.
//!
//! The demuxer reports noteworthy parse events through a caller-supplied
//! sink instead of owning any instrumentation itself.

use streamkit_common::{TimeDelta, TrackType};

/// Receiver for demuxer-side measurements.
///
/// All methods have empty default implementations so a sink only implements
/// what it cares about.
pub trait MetricsSink {
    /// A held-back buffer was flushed with an estimated (not observed)
    /// duration at end of segment.
    fn duration_estimated(&mut self, _track_type: TrackType, _estimate: TimeDelta) {}

    /// A block addressed to a track in the ignore-set was dropped.
    fn block_ignored(&mut self, _track_num: u64) {}
}

/// A sink that discards every measurement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        estimates: Vec<(TrackType, TimeDelta)>,
        ignored: usize,
    }

    impl MetricsSink for Counting {
        fn duration_estimated(&mut self, track_type: TrackType, estimate: TimeDelta) {
            self.estimates.push((track_type, estimate));
        }

        fn block_ignored(&mut self, _track_num: u64) {
            self.ignored += 1;
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let mut sink = NullMetrics;
        sink.duration_estimated(TrackType::Audio, TimeDelta::from_millis(23));
        sink.block_ignored(5);
    }

    #[test]
    fn test_counting_sink() {
        let mut sink = Counting::default();
        sink.duration_estimated(TrackType::Video, TimeDelta::from_millis(42));
        sink.block_ignored(3);
        assert_eq!(sink.estimates.len(), 1);
        assert_eq!(sink.ignored, 1);
    }
}
