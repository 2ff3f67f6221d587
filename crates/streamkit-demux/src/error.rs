//! Error types for streamkit-demux.
//!
//! Fatal parse errors abort the current container unit; the caller must
//! resynchronize to the next unit boundary or rebuild the parser. "Need more
//! data" is not an error: incremental parse entry points return `Ok(0)` for
//! it.

use streamkit_common::TimeDelta;
use thiserror::Error;

/// Result type for streamkit-demux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for streamkit-demux operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed cluster framing (bad element header, zero-size cluster, ...).
    #[error("Invalid cluster: {0}")]
    InvalidCluster(String),

    /// Malformed block inside a cluster.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// A block referenced a track number the configuration does not know.
    #[error("Unknown track number: {0}")]
    UnknownTrack(u64),

    /// A container feature this demuxer deliberately rejects (e.g. lacing).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A text block arrived without the explicit duration text requires.
    #[error("Text block on track {0} has no block duration")]
    MissingTextDuration(u64),

    /// A resolved buffer duration was negative or otherwise unusable.
    #[error("Invalid duration {duration} on track {track_num}")]
    InvalidDuration {
        track_num: u64,
        duration: TimeDelta,
    },

    /// A buffer's decode timestamp regressed relative to its predecessor.
    /// Ordering violations should be excluded upstream; hitting this is a
    /// defect, not a recoverable stream condition.
    #[error("Decode timestamp regression on track {track_num}: {current} < {previous}")]
    TimestampRegression {
        track_num: u64,
        previous: TimeDelta,
        current: TimeDelta,
    },

    /// A splice-conversion precondition was violated.
    #[error("Invalid splice: {0}")]
    InvalidSplice(String),

    /// A preroll-binding precondition was violated.
    #[error("Invalid preroll: {0}")]
    InvalidPreroll(String),

    /// Malformed fixed-size elementary frame header.
    #[error("Invalid frame header: {0}")]
    InvalidFrameHeader(String),
}

impl Error {
    /// Create an invalid cluster error.
    pub fn invalid_cluster(msg: impl Into<String>) -> Self {
        Self::InvalidCluster(msg.into())
    }

    /// Create an invalid block error.
    pub fn invalid_block(msg: impl Into<String>) -> Self {
        Self::InvalidBlock(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an invalid splice error.
    pub fn invalid_splice(msg: impl Into<String>) -> Self {
        Self::InvalidSplice(msg.into())
    }

    /// Create an invalid preroll error.
    pub fn invalid_preroll(msg: impl Into<String>) -> Self {
        Self::InvalidPreroll(msg.into())
    }

    /// Create an invalid frame header error.
    pub fn invalid_frame_header(msg: impl Into<String>) -> Self {
        Self::InvalidFrameHeader(msg.into())
    }
}
