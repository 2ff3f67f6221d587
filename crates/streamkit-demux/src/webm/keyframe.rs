//! Keyframe detection by payload inspection.
//!
//! Grouped blocks carry no trusted keyframe flag, so the codec's own frame
//! header is the only reliable signal.

use serde::{Deserialize, Serialize};

/// Video codec carried by the container's video track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// VP8 bitstream.
    #[default]
    Vp8,
    /// VP9 bitstream.
    Vp9,
}

/// Inspect a video frame payload for the codec's keyframe marker.
pub(crate) fn is_video_keyframe(codec: VideoCodec, data: &[u8]) -> bool {
    match codec {
        VideoCodec::Vp8 => is_vp8_keyframe(data),
        VideoCodec::Vp9 => is_vp9_keyframe(data),
    }
}

/// VP8 frame tag: bit 0 of the first byte is the inverse keyframe flag.
fn is_vp8_keyframe(data: &[u8]) -> bool {
    match data.first() {
        Some(&b) => b & 0x01 == 0,
        None => false,
    }
}

/// VP9 uncompressed header:
/// `frame_marker(2)=0b10, profile_low(1), profile_high(1),
/// [reserved(1) if profile 3], show_existing_frame(1), frame_type(1)`
/// where frame_type 0 is a keyframe.
fn is_vp9_keyframe(data: &[u8]) -> bool {
    let Some(&first) = data.first() else {
        return false;
    };
    if first >> 6 != 0b10 {
        return false;
    }

    let profile = ((first >> 5) & 0x01) | ((first >> 3) & 0x02);
    // Bit position of show_existing_frame, counting from the MSB.
    let mut bit = if profile == 3 { 5 } else { 4 };

    let show_existing_frame = (first >> (7 - bit)) & 0x01;
    if show_existing_frame != 0 {
        return false;
    }
    bit += 1;
    let frame_type = (first >> (7 - bit)) & 0x01;
    frame_type == 0
}
