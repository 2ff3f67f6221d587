//! Logical stream kinds produced by the demuxers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of logical track a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Audio stream.
    Audio,
    /// Video stream.
    Video,
    /// Timed text stream (subtitles, captions).
    Text,
}

impl TrackType {
    /// Whether buffers of this kind participate in the cross-track ready
    /// window. Text tracks never hold back buffers, so they are excluded.
    pub fn bounds_ready_window(self) -> bool {
        matches!(self, TrackType::Audio | TrackType::Video)
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Text => write!(f, "text"),
        }
    }
}
